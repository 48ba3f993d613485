//! In-memory line item registry: targeting, pacing and impression ingestion.
//!
//! # Modules
//! - `association`: Line item ↔ creative pairings
//! - `clock`: Injectable time source
//! - `creative`: Creative records and type validation
//! - `ingest`: Impression report application
//! - `line_item`: Line item records and validation
//! - `pacing`: Daily goal, slot goal, pacing and status math
//! - `registry`: Concurrent store tying the above together
//! - `targeting`: Per-dimension allow-list matchers and query keys

pub mod association;
pub mod clock;
pub mod creative;
pub mod ingest;
pub mod line_item;
pub mod pacing;
pub mod registry;
pub mod targeting;

pub use clock::{Clock, ManualClock, SystemClock};
pub use creative::{Creative, CreativeSpec, CreativeType};
pub use ingest::{ImpressionReport, IngestSummary};
pub use line_item::{DeliveryCounters, LineItem, LineItemSpec};
pub use pacing::LineItemStatus;
pub use registry::{QueryResult, Registry, RegistrySnapshot, RegistryStats};
