//! Per-species census of the field.

use crate::entity::World;
use eco_core::PopulationCounts;

/// Species counts recomputed from the grid on demand.
///
/// Births and deaths happen all over the field during a step, so instead of
/// tracking them incrementally the orchestrator marks the tracker dirty and
/// the next query rescans every cell.
#[derive(Debug, Clone)]
pub struct PopulationTracker {
    counts: PopulationCounts,
    dirty: bool,
}

impl PopulationTracker {
    /// Start with every known species registered at zero, so that extinct
    /// species still show up in the counts
    pub fn new<'a>(species: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = PopulationCounts::new();
        for name in species {
            counts.register(name);
        }
        Self { counts, dirty: true }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn counts(&mut self, world: &World) -> &PopulationCounts {
        if self.dirty {
            self.recount(world);
        }
        &self.counts
    }

    /// More than one species still alive on the field
    pub fn is_viable(&mut self, world: &World) -> bool {
        self.counts(world).is_viable()
    }

    fn recount(&mut self, world: &World) {
        self.counts.reset();
        for (_, occupant) in world.grid().iter() {
            if let Some(entity) = occupant.and_then(|id| world.get(id)) {
                if entity.is_alive() {
                    self.counts.increment(entity.name());
                }
            }
        }
        self.dirty = false;
    }
}
