//! Step orchestrator for the ecosystem.

use crate::animal::{Animal, AnimalProfile, Predator};
use crate::clock::{DayClock, StepCounter};
use crate::entity::{Entity, StepContext, World};
use crate::environment::{ClimateScenario, EnvironmentalClock};
use crate::plant::{Plant, PlantProfile};
use crate::population::PopulationTracker;
use chrono::Utc;
use eco_core::{
    EntityId, Error, GridSnapshot, PopulationCounts, Result, RunId, RunSummary, SimulationConfig,
    StepStatus, StopReason,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Cooperative on/off flag, shared with whoever drives the simulation.
/// Checked before every step, never during one.
#[derive(Debug, Clone)]
pub struct RunSwitch(Arc<AtomicBool>);

impl RunSwitch {
    pub fn new(on: bool) -> Self {
        Self(Arc::new(AtomicBool::new(on)))
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn turn_on(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn turn_off(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

pub struct Simulation {
    config: SimulationConfig,
    world: World,
    /// Entities that act this step, in the order they act
    live: Vec<EntityId>,
    environment: EnvironmentalClock,
    steps: StepCounter,
    day: DayClock,
    tracker: PopulationTracker,
    rng: ChaCha8Rng,
    switch: RunSwitch,
    births: u64,
    deaths: u64,
}

impl Simulation {
    /// Validate `config` and populate a fresh field.
    #[instrument(skip(config), fields(rows = config.rows, cols = config.cols, seed = config.seed))]
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (world, live) = populate(&config, &mut rng)?;
        let sim = Self::assemble(config, world, live, rng);

        info!(
            event = "simulation_created",
            habitat = %sim.config.habitat.name,
            scenario = %sim.config.scenario,
            animals = sim.config.animal_count(),
            plants = sim.config.plant_count(),
            "Simulation created"
        );
        Ok(sim)
    }

    /// Run a hand-built world under `config`'s rules. Population entries
    /// in the config are ignored.
    pub fn from_world(config: SimulationConfig, world: World) -> Result<Self> {
        config.rules.validate()?;
        config.habitat.validate()?;
        if world.grid().rows != config.rows || world.grid().cols != config.cols {
            return Err(Error::Validation(format!(
                "world is {}x{} but config expects {}x{}",
                world.grid().rows,
                world.grid().cols,
                config.rows,
                config.cols
            )));
        }
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let live = world
            .ids()
            .into_iter()
            .filter(|id| world.get(*id).is_some_and(Entity::is_retained))
            .collect();
        Ok(Self::assemble(config, world, live, rng))
    }

    fn assemble(config: SimulationConfig, world: World, live: Vec<EntityId>, rng: ChaCha8Rng) -> Self {
        let scenario = ClimateScenario::new(config.scenario);
        let environment = EnvironmentalClock::new(&config.habitat, scenario, &config.rules);
        let day = DayClock::new(config.start_at_night, config.rules.day_length_steps);
        let tracker = PopulationTracker::new(
            std::iter::once(config.plant.name.as_str())
                .chain(config.species.iter().map(|s| s.name.as_str())),
        );
        Self {
            config,
            world,
            live,
            environment,
            steps: StepCounter::new(),
            day,
            tracker,
            rng,
            switch: RunSwitch::default(),
            births: 0,
            deaths: 0,
        }
    }

    /// Execute one step. Returns `None` without touching anything when the
    /// run switch is off.
    pub fn step(&mut self) -> Result<Option<StepStatus>> {
        if !self.switch.is_on() {
            return Ok(None);
        }

        let step = self.steps.increment();
        self.environment.advance(step, &mut self.rng);
        self.day.advance(step);
        let reading = self.environment.reading(step, self.day.is_night());

        let acting = std::mem::take(&mut self.live);
        let mut newborns = Vec::new();
        for id in &acting {
            let Some(mut entity) = self.world.take(*id) else {
                continue;
            };
            if let Entity::Plant(plant) = &mut entity {
                plant.sync_season(reading.is_spring);
            }
            let outcome = if entity.is_retained() {
                let mut ctx = StepContext::new(&mut self.world, reading, &self.config.rules, &mut self.rng);
                let outcome = entity.act(&mut ctx);
                newborns.extend(ctx.into_newborns());
                outcome
            } else {
                Ok(())
            };
            self.world.restore(entity);
            outcome?;
        }

        self.births += newborns.len() as u64;
        let mut live = Vec::with_capacity(acting.len() + newborns.len());
        for id in acting.into_iter().chain(newborns) {
            if self.world.get(id).is_some_and(Entity::is_retained) {
                live.push(id);
            } else if self.world.remove(id).is_some() {
                self.deaths += 1;
            }
        }
        self.live = live;
        self.tracker.invalidate();

        let status = self.status();
        if self.config.status_log_interval > 0 && step % self.config.status_log_interval == 0 {
            info!(
                event = "population_snapshot",
                step = step,
                time = %status.time_of_day,
                season = %status.season,
                temperature = status.temperature,
                total = status.counts.total(),
                species = status.counts.living_species(),
                "Population snapshot"
            );
        }
        Ok(Some(status))
    }

    /// Run up to `steps` steps, stopping early once the field is no longer
    /// viable or the switch is turned off.
    pub fn simulate(&mut self, steps: u64) -> Result<RunSummary> {
        self.simulate_with(steps, |_| {})
    }

    /// Like [`Simulation::simulate`], handing every step's status to `observer`
    #[instrument(skip(self, observer))]
    pub fn simulate_with<F>(&mut self, steps: u64, mut observer: F) -> Result<RunSummary>
    where
        F: FnMut(&StepStatus),
    {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let (births, deaths) = (self.births, self.deaths);
        let delay = Duration::from_millis(self.config.step_delay_ms);

        let mut executed = 0;
        let mut stop_reason = StopReason::Completed;
        while executed < steps {
            if !self.switch.is_on() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            if !self.is_viable() {
                stop_reason = StopReason::NotViable;
                break;
            }
            if let Some(status) = self.step()? {
                observer(&status);
            }
            executed += 1;
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }

        let summary = RunSummary {
            run_id,
            steps_executed: executed,
            final_step: self.steps.current(),
            stop_reason,
            counts: self.counts().clone(),
            births: self.births - births,
            deaths: self.deaths - deaths,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            event = "run_complete",
            run_id = %summary.run_id,
            steps_executed = summary.steps_executed,
            final_step = summary.final_step,
            stop_reason = ?summary.stop_reason,
            births = summary.births,
            deaths = summary.deaths,
            survivors = summary.counts.total(),
            "Run complete"
        );
        Ok(summary)
    }

    /// The long run configured by `long_run_steps`
    pub fn run_long(&mut self) -> Result<RunSummary> {
        self.simulate(self.config.long_run_steps)
    }

    /// Stop the simulation and empty the field. Steps are no-ops until
    /// [`Simulation::reset`].
    pub fn end(&mut self) {
        self.switch.turn_off();
        self.steps.reset();
        self.live.clear();
        self.world = World::new(self.config.rows, self.config.cols);
        self.tracker.invalidate();
        info!(event = "simulation_ended", "Simulation ended");
    }

    /// Rebuild the initial field from the stored config and seed, then turn
    /// the switch back on.
    pub fn reset(&mut self) -> Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let (world, live) = populate(&self.config, &mut rng)?;
        let fresh = Self::assemble(self.config.clone(), world, live, rng);

        // Keep the existing switch so outside holders still control us.
        let switch = self.switch.clone();
        *self = Self { switch, ..fresh };
        self.switch.turn_on();
        info!(event = "simulation_reset", seed = self.config.seed, "Simulation reset");
        Ok(())
    }

    pub fn status(&mut self) -> StepStatus {
        StepStatus {
            step: self.steps.current(),
            time_of_day: self.day.time_string(),
            season: self.environment.season_name().to_string(),
            temperature: self.environment.temperature(),
            counts: self.counts().clone(),
        }
    }

    pub fn snapshot(&self) -> GridSnapshot {
        self.world.snapshot()
    }

    pub fn counts(&mut self) -> &PopulationCounts {
        self.tracker.counts(&self.world)
    }

    pub fn is_viable(&mut self) -> bool {
        self.tracker.is_viable(&self.world)
    }

    pub fn switch(&self) -> RunSwitch {
        self.switch.clone()
    }

    pub fn is_running(&self) -> bool {
        self.switch.is_on()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn environment(&self) -> &EnvironmentalClock {
        &self.environment
    }

    pub fn step_count(&self) -> u64 {
        self.steps.current()
    }

    pub fn is_night(&self) -> bool {
        self.day.is_night()
    }

    pub fn time_string(&self) -> String {
        self.day.time_string()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn births(&self) -> u64 {
        self.births
    }

    pub fn deaths(&self) -> u64 {
        self.deaths
    }
}

/// Place the configured animals, in population order, then the plants,
/// each on a random free cell.
fn populate(config: &SimulationConfig, rng: &mut ChaCha8Rng) -> Result<(World, Vec<EntityId>)> {
    let mut world = World::new(config.rows, config.cols);
    let mut live = Vec::with_capacity(config.animal_count() + config.plant_count());

    for entry in &config.populations {
        let record = config
            .species(&entry.species)
            .ok_or_else(|| Error::NotFound(format!("species '{}'", entry.species)))?;
        let profile = Arc::new(AnimalProfile::from(record));
        for _ in 0..entry.count {
            let cell = free_cell(&world, rng)?;
            let id = world.allocate_id();
            let animal = Animal::spawn(id, Arc::clone(&profile), cell, config.random_initial_age, rng);
            let entity = if record.predator {
                Entity::Predator(Predator::new(animal, record.strength))
            } else {
                Entity::Animal(animal)
            };
            live.push(world.insert(entity)?);
        }
    }

    let profile = Arc::new(PlantProfile::from(&config.plant));
    for _ in 0..config.plant_count() {
        let cell = free_cell(&world, rng)?;
        let id = world.allocate_id();
        let plant = Plant::new(id, Arc::clone(&profile), cell, config.plant.max_health);
        live.push(world.insert(Entity::Plant(plant))?);
    }

    Ok((world, live))
}

fn free_cell(world: &World, rng: &mut ChaCha8Rng) -> Result<eco_core::Coordinate> {
    world
        .grid()
        .random_free_coordinate(rng)
        .ok_or_else(|| Error::Capacity("no free cell left on the field".to_string()))
}
