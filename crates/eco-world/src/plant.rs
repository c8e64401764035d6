//! Plants: stationary food that withers in bad weather and regrows in spring.

use crate::entity::{DeathCause, Entity, StepContext};
use crate::grid::Grid;
use eco_core::{Coordinate, EntityId, PlantRecord, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Traits shared by every plant of a kind
#[derive(Debug, Clone, PartialEq)]
pub struct PlantProfile {
    pub name: String,
    pub max_temperature: i32,
    pub min_temperature: i32,
    pub nutritional_value: i32,
    pub reproduction_probability: f64,
}

impl PlantProfile {
    pub fn survives(&self, temperature: i32) -> bool {
        (self.min_temperature..=self.max_temperature).contains(&temperature)
    }
}

impl From<&PlantRecord> for PlantProfile {
    fn from(record: &PlantRecord) -> Self {
        Self {
            name: record.name.clone(),
            max_temperature: record.max_temperature,
            min_temperature: record.min_temperature,
            nutritional_value: record.nutritional_value,
            reproduction_probability: record.reproduction_probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantState {
    Alive,
    /// Killed by temperature; off the grid but remembers its cell
    Dormant,
    /// Eaten down to nothing
    Dead,
}

#[derive(Debug, Clone)]
pub struct Plant {
    id: EntityId,
    state: PlantState,
    location: Option<Coordinate>,
    profile: Arc<PlantProfile>,
    max_health: i32,
    health: i32,
    can_regrow: bool,
    is_spring: bool,
}

impl Plant {
    pub fn new(id: EntityId, profile: Arc<PlantProfile>, location: Coordinate, max_health: i32) -> Self {
        Self {
            id,
            state: PlantState::Alive,
            location: Some(location),
            profile,
            max_health,
            health: max_health,
            can_regrow: true,
            is_spring: true,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn location(&self) -> Option<Coordinate> {
        self.location
    }

    pub fn state(&self) -> PlantState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == PlantState::Alive
    }

    /// Dormant plants stay in the live collection so they can regrow
    pub fn is_retained(&self) -> bool {
        self.state != PlantState::Dead
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn nutritional_value(&self) -> i32 {
        self.profile.nutritional_value
    }

    pub fn can_regrow(&self) -> bool {
        self.can_regrow
    }

    pub fn is_spring(&self) -> bool {
        self.is_spring
    }

    /// Reconcile the cached spring flag with the clock. Every toggle rearms
    /// regrowth.
    pub fn sync_season(&mut self, is_spring: bool) {
        if self.is_spring != is_spring {
            self.is_spring = is_spring;
            self.can_regrow = true;
        }
    }

    /// One bite. At zero health the plant is gone for good.
    pub fn eaten(&mut self, grid: &mut Grid) {
        if !self.is_alive() {
            return;
        }
        self.health -= 1;
        if self.health <= 0 {
            self.state = PlantState::Dead;
            if let Some(location) = self.location.take() {
                grid.clear(location);
            }
            trace!(
                event = "plant_death",
                entity_id = %self.id,
                cause = ?DeathCause::Grazed,
                "Plant eaten to the ground"
            );
        }
    }

    pub fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let reading = ctx.reading;
        match self.state {
            PlantState::Dead => Ok(()),
            PlantState::Alive if !self.profile.survives(reading.temperature) => {
                self.wither(ctx.world.grid_mut());
                Ok(())
            }
            PlantState::Alive => {
                if reading.is_night {
                    return Ok(());
                }
                if reading.year_passed {
                    self.max_health += 1;
                }
                self.reproduce(ctx)?;
                if self.health < self.max_health && ctx.rng.gen_bool(ctx.rules.plant_heal_probability) {
                    self.health += 1;
                }
                Ok(())
            }
            PlantState::Dormant => {
                if !reading.is_night && self.is_spring && self.profile.survives(reading.temperature) {
                    self.regrow(ctx.world.grid_mut())?;
                }
                Ok(())
            }
        }
    }

    fn wither(&mut self, grid: &mut Grid) {
        let Some(location) = self.location else {
            return;
        };
        self.state = PlantState::Dormant;
        self.can_regrow = false;
        grid.clear(location);
        trace!(event = "plant_withered", entity_id = %self.id, location = %location, "Plant withered");
    }

    fn regrow(&mut self, grid: &mut Grid) -> Result<()> {
        let Some(location) = self.location else {
            return Ok(());
        };
        if !self.can_regrow || !grid.is_free(location) {
            return Ok(());
        }
        grid.place(self.id, location)?;
        self.state = PlantState::Alive;
        self.health = self.max_health;
        trace!(event = "plant_regrew", entity_id = %self.id, location = %location, "Plant regrew");
        Ok(())
    }

    /// Seed the first free neighbouring cell
    fn reproduce(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let Some(location) = self.location else {
            return Ok(());
        };
        if !ctx.rng.gen_bool(self.profile.reproduction_probability) {
            return Ok(());
        }
        let Some(cell) = ctx.world.grid().free_neighbors(location).into_iter().next() else {
            return Ok(());
        };

        let id = ctx.world.allocate_id();
        let mut seedling = Plant::new(id, Arc::clone(&self.profile), cell, self.max_health);
        seedling.is_spring = self.is_spring;
        ctx.adopt(Entity::Plant(seedling))?;
        debug!(event = "birth", parent_id = %self.id, species = %self.profile.name, litter = 1, "Plant seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::World;
    use crate::environment::EnvironmentReading;
    use eco_core::LifecycleRules;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grass(reproduction_probability: f64) -> Arc<PlantProfile> {
        Arc::new(PlantProfile {
            name: "grass".to_string(),
            max_temperature: 30,
            min_temperature: 0,
            nutritional_value: 4,
            reproduction_probability,
        })
    }

    fn reading(temperature: i32, is_spring: bool) -> EnvironmentReading {
        EnvironmentReading {
            temperature,
            is_night: false,
            year_passed: false,
            is_spring,
        }
    }

    /// Act the way a step does: sync the season flag first
    fn act(world: &mut World, id: EntityId, reading: EnvironmentReading, rules: &LifecycleRules) -> Vec<EntityId> {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut entity = world.take(id).unwrap();
        if let Entity::Plant(plant) = &mut entity {
            plant.sync_season(reading.is_spring);
        }
        let mut ctx = StepContext::new(world, reading, rules, &mut rng);
        entity.act(&mut ctx).unwrap();
        let newborns = ctx.into_newborns();
        world.restore(entity);
        newborns
    }

    fn plant(world: &World, id: EntityId) -> &Plant {
        world.get(id).and_then(Entity::as_plant).unwrap()
    }

    fn seed(world: &mut World, profile: Arc<PlantProfile>, cell: Coordinate, health: i32) -> EntityId {
        let id = world.allocate_id();
        world.insert(Entity::Plant(Plant::new(id, profile, cell, health))).unwrap()
    }

    #[test]
    fn test_eaten_until_dead() {
        let mut grid = Grid::new(2, 2);
        let cell = Coordinate::new(0, 0);
        let mut p = Plant::new(EntityId(0), grass(0.0), cell, 2);
        grid.place(p.id(), cell).unwrap();

        p.eaten(&mut grid);
        assert!(p.is_alive());
        assert_eq!(p.health(), 1);

        p.eaten(&mut grid);
        assert_eq!(p.state(), PlantState::Dead);
        assert!(!p.is_retained());
        assert_eq!(p.location(), None);
        assert!(grid.is_free(cell));
    }

    #[test]
    fn test_lethal_temperature_keeps_coordinate() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let cell = Coordinate::new(1, 1);
        let id = seed(&mut world, grass(0.0), cell, 3);

        act(&mut world, id, reading(45, true), &rules);
        let p = plant(&world, id);
        assert_eq!(p.state(), PlantState::Dormant);
        assert!(p.is_retained());
        assert!(!p.is_alive());
        assert_eq!(p.location(), Some(cell));
        assert!(world.grid().is_free(cell));
    }

    #[test]
    fn test_no_regrowth_in_the_spring_it_died() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let cell = Coordinate::new(1, 1);
        let id = seed(&mut world, grass(0.0), cell, 3);

        act(&mut world, id, reading(-10, true), &rules);
        for _ in 0..5 {
            act(&mut world, id, reading(10, true), &rules);
            assert_eq!(plant(&world, id).state(), PlantState::Dormant);
        }

        // Summer: flag toggles, but regrowth needs spring.
        act(&mut world, id, reading(10, false), &rules);
        assert_eq!(plant(&world, id).state(), PlantState::Dormant);
        assert!(plant(&world, id).can_regrow());

        act(&mut world, id, reading(10, true), &rules);
        let p = plant(&world, id);
        assert!(p.is_alive());
        assert_eq!(p.health(), 3);
        assert_eq!(world.grid().get(cell), Some(id));
    }

    #[test]
    fn test_regrowth_waits_for_empty_cell() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let cell = Coordinate::new(1, 1);
        let id = seed(&mut world, grass(0.0), cell, 3);
        act(&mut world, id, reading(-10, false), &rules);

        let squatter = seed(&mut world, grass(0.0), cell, 1);
        act(&mut world, id, reading(10, true), &rules);
        assert_eq!(plant(&world, id).state(), PlantState::Dormant);

        world.remove(squatter);
        act(&mut world, id, reading(10, true), &rules);
        assert!(plant(&world, id).is_alive());
    }

    #[test]
    fn test_no_regrowth_at_night() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let id = seed(&mut world, grass(0.0), Coordinate::new(0, 0), 3);
        act(&mut world, id, reading(-10, false), &rules);

        let night = EnvironmentReading {
            is_night: true,
            ..reading(10, true)
        };
        act(&mut world, id, night, &rules);
        assert_eq!(plant(&world, id).state(), PlantState::Dormant);
    }

    #[test]
    fn test_seedling_takes_first_free_cell_and_inherits_season() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let parent = seed(&mut world, grass(1.0), Coordinate::new(1, 1), 3);
        seed(&mut world, grass(0.0), Coordinate::new(0, 0), 1);

        let newborns = act(&mut world, parent, reading(10, false), &rules);
        assert_eq!(newborns.len(), 1);
        let child = plant(&world, newborns[0]);
        assert_eq!(child.location(), Some(Coordinate::new(0, 1)));
        assert!(!child.is_spring());
        assert_eq!(child.max_health(), 3);
    }

    #[test]
    fn test_max_health_grows_yearly_in_daylight() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules::default();
        let id = seed(&mut world, grass(0.0), Coordinate::new(1, 1), 3);
        let year = EnvironmentReading {
            year_passed: true,
            ..reading(10, true)
        };
        act(&mut world, id, year, &rules);
        assert_eq!(plant(&world, id).max_health(), 4);

        let night_year = EnvironmentReading {
            is_night: true,
            ..year
        };
        act(&mut world, id, night_year, &rules);
        assert_eq!(plant(&world, id).max_health(), 4);
    }

    #[test]
    fn test_healing_never_exceeds_max() {
        let mut world = World::new(3, 3);
        let rules = LifecycleRules {
            plant_heal_probability: 1.0,
            ..Default::default()
        };
        let id = seed(&mut world, grass(0.0), Coordinate::new(1, 1), 3);
        world.graze(id);
        world.graze(id);
        assert_eq!(plant(&world, id).health(), 1);

        for _ in 0..5 {
            act(&mut world, id, reading(10, true), &rules);
        }
        assert_eq!(plant(&world, id).health(), 3);
    }
}
