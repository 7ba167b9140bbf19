// =============================================================================
// Latest-Value Cache — most recent tick per instrument
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::LatestTick;

/// Instrument → last ingested observation.  Overwritten on every ingest, no
/// history retained.
#[derive(Default)]
pub struct LatestTickCache {
    entries: RwLock<HashMap<String, LatestTick>>,
}

impl LatestTickCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, instrument: &str, latest: LatestTick) {
        let mut map = self.entries.write();
        match map.get_mut(instrument) {
            Some(slot) => *slot = latest,
            None => {
                map.insert(instrument.to_string(), latest);
            }
        }
    }

    pub fn latest(&self, instrument: &str) -> Option<LatestTick> {
        self.entries.read().get(instrument).copied()
    }

    /// Copy of every entry, sorted by instrument name.
    pub fn all(&self) -> Vec<(String, LatestTick)> {
        let mut rows: Vec<(String, LatestTick)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
