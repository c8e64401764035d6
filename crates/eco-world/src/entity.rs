//! Entity arena and the shared surface of plants, animals and predators.
//!
//! The grid maps coordinates to [`EntityId`]s and each entity caches its own
//! coordinate. All placement goes through [`Grid`]; entities never hold a
//! reference back to the world.

use crate::animal::{Animal, Predator};
use crate::environment::EnvironmentReading;
use crate::grid::Grid;
use crate::plant::Plant;
use eco_core::{Coordinate, EntityId, GridSnapshot, LifecycleRules, Result};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Why an entity left the field for good
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeathCause {
    OldAge,
    Starvation,
    Temperature,
    Overcrowding,
    Predation,
    Horde,
    Grazed,
}

/// A simulated organism
#[derive(Debug, Clone)]
pub enum Entity {
    Plant(Plant),
    Animal(Animal),
    Predator(Predator),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Plant(plant) => plant.id(),
            Entity::Animal(animal) => animal.id(),
            Entity::Predator(predator) => predator.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Plant(plant) => plant.name(),
            Entity::Animal(animal) => animal.name(),
            Entity::Predator(predator) => predator.name(),
        }
    }

    /// Cached coordinate. A dormant plant keeps its coordinate while off the grid.
    pub fn location(&self) -> Option<Coordinate> {
        match self {
            Entity::Plant(plant) => plant.location(),
            Entity::Animal(animal) => animal.location(),
            Entity::Predator(predator) => predator.location(),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Entity::Plant(plant) => plant.is_alive(),
            Entity::Animal(animal) => animal.is_alive(),
            Entity::Predator(predator) => predator.is_alive(),
        }
    }

    /// Whether the entity stays in the live collection after a step.
    /// Only dormant plants are retained without being alive.
    pub fn is_retained(&self) -> bool {
        match self {
            Entity::Plant(plant) => plant.is_retained(),
            _ => self.is_alive(),
        }
    }

    pub fn nutritional_value(&self) -> i32 {
        match self {
            Entity::Plant(plant) => plant.nutritional_value(),
            Entity::Animal(animal) => animal.nutritional_value(),
            Entity::Predator(predator) => predator.nutritional_value(),
        }
    }

    /// Shared animal state of an animal or predator
    pub fn as_animal(&self) -> Option<&Animal> {
        match self {
            Entity::Animal(animal) => Some(animal),
            Entity::Predator(predator) => Some(predator.animal()),
            Entity::Plant(_) => None,
        }
    }

    pub fn as_animal_mut(&mut self) -> Option<&mut Animal> {
        match self {
            Entity::Animal(animal) => Some(animal),
            Entity::Predator(predator) => Some(predator.animal_mut()),
            Entity::Plant(_) => None,
        }
    }

    pub fn as_plant(&self) -> Option<&Plant> {
        match self {
            Entity::Plant(plant) => Some(plant),
            _ => None,
        }
    }

    pub fn strength(&self) -> Option<u32> {
        match self {
            Entity::Predator(predator) => Some(predator.strength()),
            _ => None,
        }
    }

    /// Run one step of this entity's behaviour
    pub fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        match self {
            Entity::Plant(plant) => plant.act(ctx),
            Entity::Animal(animal) => animal.tick(ctx, Animal::forage),
            Entity::Predator(predator) => predator.act(ctx),
        }
    }

    fn occupies_cell(&self) -> bool {
        self.is_alive() && self.location().is_some()
    }
}

/// The grid together with every entity that is alive or retained
#[derive(Debug, Clone)]
pub struct World {
    grid: Grid,
    entities: HashMap<EntityId, Entity>,
    next_id: u64,
}

impl World {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            entities: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add an entity, claiming its cell when it is alive.
    pub fn insert(&mut self, entity: Entity) -> Result<EntityId> {
        let id = entity.id();
        if entity.occupies_cell() {
            if let Some(location) = entity.location() {
                self.grid.place(id, location)?;
            }
        }
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Detach an entity without touching the grid
    pub(crate) fn take(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Re-attach an entity detached with [`World::take`]
    pub(crate) fn restore(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    /// Drop an entity, vacating its cell if it still holds one
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(location) = entity.location() {
            if self.grid.get(location) == Some(id) {
                self.grid.clear(location);
            }
        }
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn occupant(&self, coord: Coordinate) -> Option<&Entity> {
        self.grid.get(coord).and_then(|id| self.entities.get(&id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entity ids in creation order
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Live animals and predators in the adjacent cells, in scan order
    pub fn neighbor_animals(&self, coord: Coordinate) -> Vec<EntityId> {
        self.grid
            .neighbor_occupants(coord)
            .into_iter()
            .filter(|id| {
                self.entities
                    .get(id)
                    .and_then(Entity::as_animal)
                    .is_some_and(Animal::is_alive)
            })
            .collect()
    }

    /// Bite a living plant. Returns the food it yields.
    pub fn graze(&mut self, id: EntityId) -> Option<i32> {
        match self.entities.get_mut(&id) {
            Some(Entity::Plant(plant)) if plant.is_alive() => {
                plant.eaten(&mut self.grid);
                Some(plant.nutritional_value())
            }
            _ => None,
        }
    }

    /// Kill a living animal, returning the cell it vacated
    pub fn kill(&mut self, id: EntityId, cause: DeathCause) -> Option<Coordinate> {
        let animal = self.entities.get_mut(&id)?.as_animal_mut()?;
        if !animal.is_alive() {
            return None;
        }
        let location = animal.location();
        animal.die(&mut self.grid, cause);
        location
    }

    /// Add food to a living animal
    pub fn feed(&mut self, id: EntityId, amount: i32) {
        if let Some(animal) = self.entities.get_mut(&id).and_then(Entity::as_animal_mut) {
            if animal.is_alive() {
                animal.feed(amount);
            }
        }
    }

    /// Species name of every cell, row-major
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            rows: self.grid.rows,
            cols: self.grid.cols,
            cells: self
                .grid
                .iter()
                .map(|(_, id)| id.and_then(|id| self.entities.get(&id)).map(|e| e.name().to_string()))
                .collect(),
        }
    }
}

/// Everything an entity may touch while it acts
pub struct StepContext<'a> {
    pub world: &'a mut World,
    pub reading: EnvironmentReading,
    pub rules: &'a LifecycleRules,
    pub rng: &'a mut ChaCha8Rng,
    newborns: Vec<EntityId>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        world: &'a mut World,
        reading: EnvironmentReading,
        rules: &'a LifecycleRules,
        rng: &'a mut ChaCha8Rng,
    ) -> Self {
        Self {
            world,
            reading,
            rules,
            rng,
            newborns: Vec::new(),
        }
    }

    /// Put a newborn on the field. It will not act until the next step.
    pub fn adopt(&mut self, entity: Entity) -> Result<EntityId> {
        let id = self.world.insert(entity)?;
        self.newborns.push(id);
        Ok(id)
    }

    pub fn into_newborns(self) -> Vec<EntityId> {
        self.newborns
    }
}
