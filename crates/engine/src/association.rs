//! Line item ↔ creative pairings.
//!
//! The table does not check that either side exists; the registry does that
//! before linking. Readers skip creative ids that no longer resolve.

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct AssociationTable {
    /// line item id -> creative ids in link order, no duplicates
    links: DashMap<u64, Vec<u64>>,
}

impl AssociationTable {
    pub fn new() -> Self {
        Self {
            links: DashMap::new(),
        }
    }

    /// Returns `false` when the pairing already existed.
    pub fn link(&self, line_item_id: u64, creative_id: u64) -> bool {
        let mut creatives = self.links.entry(line_item_id).or_default();
        if creatives.contains(&creative_id) {
            return false;
        }
        creatives.push(creative_id);
        true
    }

    /// Returns `false` when the pairing was not present.
    pub fn unlink(&self, line_item_id: u64, creative_id: u64) -> bool {
        let removed = match self.links.get_mut(&line_item_id) {
            Some(mut creatives) => match creatives.iter().position(|id| *id == creative_id) {
                Some(index) => {
                    creatives.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };
        if removed {
            self.links.remove_if(&line_item_id, |_, creatives| creatives.is_empty());
        }
        removed
    }

    pub fn creatives_of(&self, line_item_id: u64) -> Vec<u64> {
        self.links
            .get(&line_item_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Total number of pairings.
    pub fn len(&self) -> usize {
        self.links.iter().map(|r| r.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.links.clear();
    }
}
