#![warn(clippy::unwrap_used)]

pub mod handlers;
pub mod router;
pub mod server;

pub use handlers::KvState;
pub use router::kv_router;
pub use server::ApiServer;
