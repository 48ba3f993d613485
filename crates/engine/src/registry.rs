//! Process-wide registry of line items, creatives and their pairings.
//!
//! Each entity lives in its own `DashMap`, so per-record mutation is atomic
//! under the shard lock. A registry-wide `RwLock` is held shared by every
//! operation and exclusively by `flush`, which keeps a flush from
//! interleaving with a half-finished add, link or report.

use crate::association::AssociationTable;
use crate::clock::{Clock, SystemClock};
use crate::creative::{Creative, CreativeSpec};
use crate::ingest::{ImpressionReport, IngestSummary};
use crate::line_item::{LineItem, LineItemSpec};
use crate::pacing::LineItemStatus;
use crate::targeting::QueryKey;
use dashmap::DashMap;
use lineitem_core::config::EngineConfig;
use lineitem_core::{EngineError, EngineResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Line items matched by a query and the creatives they can serve.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    #[serde(rename = "lineitems")]
    pub line_items: Vec<LineItem>,
    pub creatives: BTreeMap<u64, Creative>,
}

/// Full contents of the registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    #[serde(rename = "lineitems")]
    pub line_items: Vec<LineItem>,
    pub creatives: Vec<Creative>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub line_items: usize,
    pub creatives: usize,
    pub associations: usize,
    pub by_status: BTreeMap<LineItemStatus, usize>,
}

pub struct Registry {
    line_items: DashMap<u64, LineItem>,
    creatives: DashMap<u64, Creative>,
    associations: AssociationTable,
    flush_guard: RwLock<()>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, EngineConfig::default())
    }

    pub fn with_config(clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        info!(slot_minutes = config.slot_minutes, "Line item registry initialized (in-memory)");
        Self {
            line_items: DashMap::new(),
            creatives: DashMap::new(),
            associations: AssociationTable::new(),
            flush_guard: RwLock::new(()),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── Creatives ─────────────────────────────────────────────────────────

    /// Validate and store a creative, replacing any creative with the same id.
    pub fn add_creative(&self, spec: CreativeSpec) -> EngineResult<Creative> {
        let creative = Creative::from_spec(spec)?;
        let _guard = self.flush_guard.read();
        self.creatives.insert(creative.id, creative.clone());
        metrics::counter!("engine.creatives.added").increment(1);
        info!(creative_id = creative.id, creative_type = %creative.creative_type, "Creative added");
        Ok(creative)
    }

    pub fn get_creative(&self, id: u64) -> EngineResult<Creative> {
        self.creatives
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| EngineError::creative_not_found(id))
    }

    pub fn list_creatives(&self) -> Vec<Creative> {
        let mut creatives: Vec<Creative> = self.creatives.iter().map(|r| r.value().clone()).collect();
        creatives.sort_by_key(|c| c.id);
        creatives
    }

    // ─── Line items ────────────────────────────────────────────────────────

    /// Validate and store a line item, replacing any line item with the same
    /// id. Targeting, daily goal and status are computed before the record
    /// becomes visible. Existing creative pairings for the id are kept.
    pub fn add_line_item(&self, spec: LineItemSpec) -> EngineResult<LineItem> {
        let line_item = LineItem::new(spec, self.clock.now(), self.config.slot_minutes)?;
        let _guard = self.flush_guard.read();
        let id = line_item.id;
        self.line_items.insert(id, line_item.clone());
        metrics::counter!("engine.line_items.added").increment(1);
        info!(
            line_item_id = id,
            goal = line_item.goal,
            daily_goal = line_item.daily_goal,
            status = line_item.status.as_str(),
            targeting = %line_item.targeting_key,
            "Line item added"
        );
        Ok(self.with_creatives(line_item))
    }

    pub fn get_line_item(&self, id: u64) -> EngineResult<LineItem> {
        let line_item = self
            .line_items
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| EngineError::line_item_not_found(id))?;
        Ok(self.with_creatives(line_item))
    }

    pub fn list_line_items(&self) -> Vec<LineItem> {
        let mut line_items: Vec<LineItem> = self
            .line_items
            .iter()
            .map(|r| r.value().clone())
            .collect();
        line_items.sort_by_key(|li| li.id);
        line_items
            .into_iter()
            .map(|li| self.with_creatives(li))
            .collect()
    }

    pub fn list_all(&self) -> RegistrySnapshot {
        let _guard = self.flush_guard.read();
        RegistrySnapshot {
            line_items: self.list_line_items(),
            creatives: self.list_creatives(),
        }
    }

    /// Pacing the line item would report for a hypothetical slot count.
    pub fn pacing_for_slot(&self, line_item_id: u64, slot_impressions: u64) -> EngineResult<u64> {
        self.line_items
            .get(&line_item_id)
            .map(|li| li.pacing_for_slot(slot_impressions, self.config.slot_minutes))
            .ok_or_else(|| EngineError::line_item_not_found(line_item_id))
    }

    fn with_creatives(&self, mut line_item: LineItem) -> LineItem {
        line_item.creative_ids = self.associations.creatives_of(line_item.id);
        line_item
    }

    // ─── Associations ──────────────────────────────────────────────────────

    fn ensure_line_item(&self, id: u64) -> EngineResult<()> {
        if self.line_items.contains_key(&id) {
            Ok(())
        } else {
            Err(EngineError::line_item_not_found(id))
        }
    }

    fn ensure_creative(&self, id: u64) -> EngineResult<()> {
        if self.creatives.contains_key(&id) {
            Ok(())
        } else {
            Err(EngineError::creative_not_found(id))
        }
    }

    /// Pair a creative with a line item. Both must exist. Linking an existing
    /// pair is a no-op.
    pub fn link_creative(&self, line_item_id: u64, creative_id: u64) -> EngineResult<()> {
        let _guard = self.flush_guard.read();
        self.ensure_line_item(line_item_id)?;
        self.ensure_creative(creative_id)?;
        let added = self.associations.link(line_item_id, creative_id);
        debug!(line_item_id, creative_id, added, "Creative linked");
        Ok(())
    }

    /// Remove a pairing. Both ids must exist; an absent pair is a no-op.
    pub fn unlink_creative(&self, line_item_id: u64, creative_id: u64) -> EngineResult<()> {
        let _guard = self.flush_guard.read();
        self.ensure_line_item(line_item_id)?;
        self.ensure_creative(creative_id)?;
        let removed = self.associations.unlink(line_item_id, creative_id);
        debug!(line_item_id, creative_id, removed, "Creative unlinked");
        Ok(())
    }

    /// Link several creatives at once. The line item must exist; creative ids
    /// that do not resolve are skipped. Returns how many pairs were added.
    pub fn link_creatives(&self, line_item_id: u64, creative_ids: &[u64]) -> EngineResult<usize> {
        let _guard = self.flush_guard.read();
        self.ensure_line_item(line_item_id)?;
        let added = creative_ids
            .iter()
            .filter(|id| self.creatives.contains_key(id))
            .filter(|id| self.associations.link(line_item_id, **id))
            .count();
        debug!(line_item_id, requested = creative_ids.len(), added, "Creatives linked");
        Ok(added)
    }

    /// Unlink several creatives at once. Returns how many pairs were removed.
    pub fn unlink_creatives(&self, line_item_id: u64, creative_ids: &[u64]) -> EngineResult<usize> {
        let _guard = self.flush_guard.read();
        self.ensure_line_item(line_item_id)?;
        let removed = creative_ids
            .iter()
            .filter(|id| self.creatives.contains_key(id))
            .filter(|id| self.associations.unlink(line_item_id, **id))
            .count();
        debug!(line_item_id, requested = creative_ids.len(), removed, "Creatives unlinked");
        Ok(removed)
    }

    // ─── Targeting ─────────────────────────────────────────────────────────

    /// Find line items whose targeting matches `key` and that have at least
    /// one resolvable creative. Every targeting match has its pacing and
    /// status refreshed. Line items are returned in id order.
    pub fn query(&self, key: &str) -> QueryResult {
        let _guard = self.flush_guard.read();
        let query_key = QueryKey::parse(key);
        let now = self.clock.now();
        let mut result = QueryResult::default();

        for mut entry in self.line_items.iter_mut() {
            let line_item = entry.value_mut();
            if !line_item.matches(&query_key) {
                continue;
            }

            line_item.recalculate_pacing(self.config.slot_minutes);
            line_item.update_status(now);

            let creative_ids = self.associations.creatives_of(line_item.id);
            let mut resolved = false;
            for creative_id in &creative_ids {
                if let Some(creative) = self.creatives.get(creative_id) {
                    resolved = true;
                    result
                        .creatives
                        .entry(*creative_id)
                        .or_insert_with(|| creative.value().clone());
                }
            }

            if resolved {
                let mut snapshot = line_item.clone();
                snapshot.creative_ids = creative_ids;
                result.line_items.push(snapshot);
            }
        }

        result.line_items.sort_by_key(|li| li.id);
        metrics::counter!("engine.query.matches").increment(result.line_items.len() as u64);
        debug!(
            key,
            line_items = result.line_items.len(),
            creatives = result.creatives.len(),
            "Targeting query served"
        );
        result
    }

    // ─── Impressions ───────────────────────────────────────────────────────

    /// Apply a batch of impression reports. Each entry is applied on its own;
    /// entries for unknown line items are skipped.
    pub fn report_impressions(&self, batch: &[ImpressionReport]) -> IngestSummary {
        let _guard = self.flush_guard.read();
        let now = self.clock.now();
        let mut summary = IngestSummary::default();

        for report in batch {
            match self.line_items.get_mut(&report.line_item_id) {
                Some(mut line_item) => {
                    let status = line_item.record_impressions(
                        report.impression_count,
                        report.wins(),
                        now,
                        self.config.slot_minutes,
                    );
                    summary.applied += 1;
                    debug!(
                        line_item_id = report.line_item_id,
                        impressions = report.impression_count,
                        wins = report.wins(),
                        status = status.as_str(),
                        pacing = line_item.pacing,
                        "Impressions applied"
                    );
                }
                None => {
                    summary.skipped += 1;
                    summary.unknown_ids.push(report.line_item_id);
                    warn!(line_item_id = report.line_item_id, "Impression report for unknown line item skipped");
                }
            }
        }

        metrics::counter!("engine.impressions.applied").increment(summary.applied as u64);
        metrics::counter!("engine.impressions.skipped").increment(summary.skipped as u64);
        summary
    }

    // ─── Maintenance ───────────────────────────────────────────────────────

    /// Drop every line item, creative and pairing.
    pub fn flush(&self) {
        let _guard = self.flush_guard.write();
        let line_items = self.line_items.len();
        let creatives = self.creatives.len();
        self.line_items.clear();
        self.creatives.clear();
        self.associations.clear();
        metrics::counter!("engine.flushes").increment(1);
        info!(line_items, creatives, "Registry flushed");
    }

    pub fn stats(&self) -> RegistryStats {
        let _guard = self.flush_guard.read();
        let mut by_status = BTreeMap::new();
        for entry in self.line_items.iter() {
            *by_status.entry(entry.value().status).or_insert(0) += 1;
        }
        RegistryStats {
            line_items: self.line_items.len(),
            creatives: self.creatives.len(),
            associations: self.associations.len(),
            by_status,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
