//! Animal and predator behaviour.

use crate::entity::{DeathCause, Entity, StepContext, World};
use crate::grid::Grid;
use eco_core::{Coordinate, EntityId, LifecycleRules, Result, Sex, SpeciesRecord};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{debug, trace};

/// Traits shared by every individual of an animal species
#[derive(Debug, Clone, PartialEq)]
pub struct AnimalProfile {
    pub name: String,
    pub max_temperature: i32,
    pub min_temperature: i32,
    pub nutritional_value: i32,
    pub reproduction_probability: f64,
    pub max_age: u32,
    pub breeding_age: u32,
    pub max_litter_size: u32,
    pub hibernates: bool,
    pub nocturnal: bool,
}

impl AnimalProfile {
    pub fn survives(&self, temperature: i32) -> bool {
        (self.min_temperature..=self.max_temperature).contains(&temperature)
    }
}

impl From<&SpeciesRecord> for AnimalProfile {
    fn from(record: &SpeciesRecord) -> Self {
        Self {
            name: record.name.clone(),
            max_temperature: record.max_temperature,
            min_temperature: record.min_temperature,
            nutritional_value: record.nutritional_value,
            reproduction_probability: record.breeding_probability,
            max_age: record.max_age,
            breeding_age: record.breeding_age,
            max_litter_size: record.max_litter_size,
            hibernates: record.hibernates,
            nocturnal: record.nocturnal,
        }
    }
}

/// An animal on the field
#[derive(Debug, Clone)]
pub struct Animal {
    id: EntityId,
    alive: bool,
    location: Option<Coordinate>,
    profile: Arc<AnimalProfile>,
    age: u32,
    sex: Sex,
    food_level: i32,
    hibernation_steps: u32,
    in_hibernation: bool,
}

impl Animal {
    pub fn new(
        id: EntityId,
        profile: Arc<AnimalProfile>,
        location: Coordinate,
        sex: Sex,
        age: u32,
        food_level: i32,
    ) -> Self {
        Self {
            id,
            alive: true,
            location: Some(location),
            profile,
            age,
            sex,
            food_level,
            hibernation_steps: 0,
            in_hibernation: false,
        }
    }

    /// An individual placed at start-up: random sex, random food level and,
    /// optionally, a random age below the species' maximum.
    pub fn spawn(
        id: EntityId,
        profile: Arc<AnimalProfile>,
        location: Coordinate,
        random_age: bool,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let age = if random_age {
            rng.gen_range(0..profile.max_age)
        } else {
            0
        };
        let food_level = initial_food_level(profile.nutritional_value, rng);
        Self::new(id, profile, location, Sex::random(rng), age, food_level)
    }

    /// A newborn of `profile`: age zero, random sex and food level
    pub fn newborn(
        id: EntityId,
        profile: Arc<AnimalProfile>,
        location: Coordinate,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        Self::spawn(id, profile, location, false, rng)
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &Arc<AnimalProfile> {
        &self.profile
    }

    pub fn location(&self) -> Option<Coordinate> {
        self.location
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn food_level(&self) -> i32 {
        self.food_level
    }

    pub fn nutritional_value(&self) -> i32 {
        self.profile.nutritional_value
    }

    pub fn in_hibernation(&self) -> bool {
        self.in_hibernation
    }

    pub fn hibernation_steps(&self) -> u32 {
        self.hibernation_steps
    }

    pub fn feed(&mut self, amount: i32) {
        self.food_level += amount;
    }

    /// Leave the field for good. Death is a one-way transition.
    pub fn die(&mut self, grid: &mut Grid, cause: DeathCause) {
        if !self.alive {
            return;
        }
        self.alive = false;
        if let Some(location) = self.location.take() {
            grid.clear(location);
        }
        trace!(
            event = "animal_death",
            entity_id = %self.id,
            species = %self.profile.name,
            cause = ?cause,
            age = self.age,
            food_level = self.food_level,
            "Animal died"
        );
    }

    /// The per-step life cycle shared by animals and predators.
    ///
    /// `make_move` is the species-specific acting routine: reproduce, feed,
    /// then move.
    pub fn tick<F>(&mut self, ctx: &mut StepContext<'_>, mut make_move: F) -> Result<()>
    where
        F: FnMut(&mut Animal, &mut StepContext<'_>) -> Result<()>,
    {
        if !self.alive {
            return Ok(());
        }
        let reading = ctx.reading;

        if reading.year_passed {
            self.age += 1;
            if self.age > self.profile.max_age {
                self.die(ctx.world.grid_mut(), DeathCause::OldAge);
                return Ok(());
            }
        }

        self.update_hibernation(reading.temperature, ctx.rules);

        if self.in_hibernation {
            if self.hibernation_steps % ctx.rules.hibernation_stay_steps == 0 {
                make_move(self, ctx)?;
                self.increase_hunger(ctx.world.grid_mut());
            }
            self.hibernation_steps += 1;
        } else if !self.profile.survives(reading.temperature)
            && ctx.rng.gen_bool(ctx.rules.temperature_death_probability)
        {
            self.die(ctx.world.grid_mut(), DeathCause::Temperature);
        } else {
            if !reading.is_night || self.profile.nocturnal {
                make_move(self, ctx)?;
            }
            if !reading.is_night {
                self.increase_hunger(ctx.world.grid_mut());
            }
        }
        Ok(())
    }

    /// Acting routine of a plain animal: mate, graze, then move.
    pub fn forage(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let Some(location) = self.location else {
            return Ok(());
        };
        let neighbors = ctx.world.neighbor_animals(location);

        if self.can_reproduce(&neighbors, ctx.world) {
            self.reproduce(ctx, Entity::Animal)?;
        }
        if self.is_hungry(ctx.rules) {
            self.graze(ctx.world);
        }
        self.move_or_die(ctx, None)
    }

    fn update_hibernation(&mut self, temperature: i32, rules: &LifecycleRules) {
        if self.profile.hibernates
            && temperature <= self.profile.min_temperature + rules.hibernation_margin
        {
            self.in_hibernation = true;
        } else {
            self.in_hibernation = false;
            self.hibernation_steps = 0;
        }
    }

    fn increase_hunger(&mut self, grid: &mut Grid) {
        if !self.alive {
            return;
        }
        self.food_level -= 1;
        if self.food_level <= 0 {
            self.die(grid, DeathCause::Starvation);
        }
    }

    pub fn is_hungry(&self, rules: &LifecycleRules) -> bool {
        (self.food_level as f64) < self.profile.nutritional_value as f64 * rules.satiety_factor
    }

    /// Only females initiate mating, and only next to a male of their species.
    pub fn can_reproduce(&self, neighbors: &[EntityId], world: &World) -> bool {
        self.sex.is_female()
            && neighbors.iter().any(|id| {
                world
                    .get(*id)
                    .and_then(Entity::as_animal)
                    .is_some_and(|mate| {
                        mate.is_alive() && !mate.sex.is_female() && mate.name() == self.name()
                    })
            })
    }

    /// Litter size for this step, zero when too young or the draw fails
    fn litter_size(&self, rng: &mut ChaCha8Rng) -> usize {
        if self.age >= self.profile.breeding_age
            && rng.gen_bool(self.profile.reproduction_probability)
        {
            rng.gen_range(1..=self.profile.max_litter_size) as usize
        } else {
            0
        }
    }

    /// Give birth into the free neighbouring cells, taken in scan order.
    /// `wrap` decides which entity variant the young become.
    pub fn reproduce<W>(&self, ctx: &mut StepContext<'_>, wrap: W) -> Result<usize>
    where
        W: Fn(Animal) -> Entity,
    {
        let Some(location) = self.location else {
            return Ok(0);
        };
        let births = self.litter_size(ctx.rng);
        if births == 0 {
            return Ok(0);
        }

        let free = ctx.world.grid().free_neighbors(location);
        let mut born = 0;
        for cell in free.into_iter().take(births) {
            let id = ctx.world.allocate_id();
            let young = Animal::newborn(id, Arc::clone(&self.profile), cell, ctx.rng);
            ctx.adopt(wrap(young))?;
            born += 1;
        }

        debug!(
            event = "birth",
            parent_id = %self.id,
            species = %self.profile.name,
            litter = born,
            "Animal gave birth"
        );
        Ok(born)
    }

    /// Eat from the first living plant next to us, one bite per step.
    fn graze(&mut self, world: &mut World) {
        let Some(location) = self.location else {
            return;
        };
        for id in world.grid().neighbor_occupants(location) {
            if let Some(food) = world.graze(id) {
                self.feed(food);
                break;
            }
        }
    }

    /// Move to `preferred` if it is free, otherwise to a random free
    /// neighbour. With nowhere to go the animal dies of overcrowding.
    pub fn move_or_die(&mut self, ctx: &mut StepContext<'_>, preferred: Option<Coordinate>) -> Result<()> {
        let Some(location) = self.location else {
            return Ok(());
        };
        let grid = ctx.world.grid();
        let destination = match preferred.filter(|cell| grid.is_free(*cell)) {
            Some(cell) => Some(cell),
            None => grid.free_neighbors(location).choose(ctx.rng).copied(),
        };

        match destination {
            Some(cell) => self.relocate(ctx.world.grid_mut(), cell),
            None => {
                self.die(ctx.world.grid_mut(), DeathCause::Overcrowding);
                Ok(())
            }
        }
    }

    fn relocate(&mut self, grid: &mut Grid, to: Coordinate) -> Result<()> {
        if let Some(from) = self.location {
            grid.clear(from);
        }
        grid.place(self.id, to)?;
        self.location = Some(to);
        Ok(())
    }
}

/// Initial food level, uniform in `[nv/2, nv)`
fn initial_food_level(nutritional_value: i32, rng: &mut ChaCha8Rng) -> i32 {
    let low = (nutritional_value / 2).max(1);
    rng.gen_range(low..nutritional_value.max(low + 1))
}

/// An animal that hunts non-predators and can be overwhelmed by hordes of
/// other predator species
#[derive(Debug, Clone)]
pub struct Predator {
    animal: Animal,
    strength: u32,
}

impl Predator {
    pub fn new(animal: Animal, strength: u32) -> Self {
        Self { animal, strength }
    }

    pub fn animal(&self) -> &Animal {
        &self.animal
    }

    pub fn animal_mut(&mut self) -> &mut Animal {
        &mut self.animal
    }

    pub fn id(&self) -> EntityId {
        self.animal.id()
    }

    pub fn name(&self) -> &str {
        self.animal.name()
    }

    pub fn location(&self) -> Option<Coordinate> {
        self.animal.location()
    }

    pub fn is_alive(&self) -> bool {
        self.animal.is_alive()
    }

    pub fn nutritional_value(&self) -> i32 {
        self.animal.nutritional_value()
    }

    pub fn strength(&self) -> u32 {
        self.strength
    }

    pub fn act(&mut self, ctx: &mut StepContext<'_>) -> Result<()> {
        let strength = self.strength;
        self.animal
            .tick(ctx, |animal, ctx| hunt(animal, strength, ctx))
    }
}

/// Acting routine of a predator: survive horde attacks, mate, hunt, move.
fn hunt(animal: &mut Animal, strength: u32, ctx: &mut StepContext<'_>) -> Result<()> {
    let Some(location) = animal.location() else {
        return Ok(());
    };
    let neighbors = ctx.world.neighbor_animals(location);

    if let Some(horde) = find_horde(animal.name(), strength, &neighbors, ctx.world) {
        let share = animal.nutritional_value() / horde.len() as i32;
        for member in &horde {
            ctx.world.feed(*member, share);
        }
        debug!(
            event = "horde_attack",
            victim_id = %animal.id(),
            species = %animal.name(),
            horde_size = horde.len(),
            share = share,
            "Predator overwhelmed by a horde"
        );
        animal.die(ctx.world.grid_mut(), DeathCause::Horde);
        return Ok(());
    }

    if animal.can_reproduce(&neighbors, ctx.world) {
        animal.reproduce(ctx, |young| Entity::Predator(Predator::new(young, strength)))?;
    }

    let mut vacated = None;
    if animal.is_hungry(ctx.rules) {
        for id in &neighbors {
            let is_prey = matches!(ctx.world.get(*id), Some(Entity::Animal(prey)) if prey.is_alive());
            if !is_prey {
                continue;
            }
            let food = ctx.world.get(*id).map_or(0, Entity::nutritional_value);
            if let Some(cell) = ctx.world.kill(*id, DeathCause::Predation) {
                animal.feed(food);
                vacated = Some(cell);
                break;
            }
        }
    }

    animal.move_or_die(ctx, vacated)
}

/// The first rival species, in neighbour scan order, whose combined strength
/// among the neighbours exceeds `strength`. Returns its members.
///
/// A stronger rival later in scan order is never consulted.
pub fn find_horde(
    species: &str,
    strength: u32,
    neighbors: &[EntityId],
    world: &World,
) -> Option<Vec<EntityId>> {
    let mut examined: Vec<&str> = Vec::new();
    for id in neighbors {
        let Some(Entity::Predator(rival)) = world.get(*id) else {
            continue;
        };
        let rival_species = rival.name();
        if rival_species == species || examined.contains(&rival_species) {
            continue;
        }
        examined.push(rival_species);

        let members: Vec<EntityId> = neighbors
            .iter()
            .copied()
            .filter(|member| {
                matches!(world.get(*member), Some(Entity::Predator(p)) if p.is_alive() && p.name() == rival_species)
            })
            .collect();
        let total: u32 = members
            .iter()
            .filter_map(|member| world.get(*member).and_then(Entity::strength))
            .sum();
        if total > strength {
            return Some(members);
        }
    }
    None
}
