//! Population counts and the per-step outputs handed to renderers.

use crate::{Coordinate, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Species name to number of individuals on the field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCounts {
    counts: BTreeMap<String, usize>,
}

impl PopulationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a counter at zero so the species is reported even when absent
    pub fn register(&mut self, species: &str) {
        self.counts.entry(species.to_string()).or_insert(0);
    }

    pub fn increment(&mut self, species: &str) {
        *self.counts.entry(species.to_string()).or_insert(0) += 1;
    }

    /// Zero every counter, keeping the keys
    pub fn reset(&mut self) {
        self.counts.values_mut().for_each(|count| *count = 0);
    }

    pub fn get(&self, species: &str) -> usize {
        self.counts.get(species).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of species with at least one individual
    pub fn living_species(&self) -> usize {
        self.counts.values().filter(|&&count| count > 0).count()
    }

    /// A field stays interesting while more than one species is present
    pub fn is_viable(&self) -> bool {
        self.living_species() > 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

/// Occupancy of every cell, row-major
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Option<String>>,
}

impl GridSnapshot {
    pub fn species_at(&self, coord: Coordinate) -> Option<&str> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        self.cells[coord.row * self.cols + coord.col].as_deref()
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

/// Everything a renderer shows next to the field after a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub step: u64,
    pub time_of_day: String,
    pub season: String,
    pub temperature: i32,
    pub counts: PopulationCounts,
}

/// Why a multi-step run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// All requested steps were executed
    Completed,
    /// Fewer than two species remain
    NotViable,
    /// The run switch was turned off
    Cancelled,
}

/// Outcome of a multi-step run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub steps_executed: u64,
    pub final_step: u64,
    pub stop_reason: StopReason,
    pub counts: PopulationCounts,
    pub births: u64,
    pub deaths: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viability_requires_two_species() {
        let mut counts = PopulationCounts::new();
        counts.register("plant");
        counts.register("rabbit");
        assert!(!counts.is_viable());

        counts.increment("plant");
        assert!(!counts.is_viable());

        counts.increment("rabbit");
        assert!(counts.is_viable());
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_reset_keeps_keys() {
        let mut counts = PopulationCounts::new();
        counts.increment("fox");
        counts.increment("fox");
        counts.reset();
        assert_eq!(counts.get("fox"), 0);
        assert_eq!(counts.iter().count(), 1);
        assert_eq!(counts.get("wolf"), 0);
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = GridSnapshot {
            rows: 2,
            cols: 2,
            cells: vec![None, Some("fox".to_string()), None, None],
        };
        assert_eq!(snapshot.species_at(Coordinate::new(0, 1)), Some("fox"));
        assert_eq!(snapshot.species_at(Coordinate::new(1, 1)), None);
        assert_eq!(snapshot.species_at(Coordinate::new(5, 5)), None);
        assert_eq!(snapshot.occupied(), 1);
    }
}
