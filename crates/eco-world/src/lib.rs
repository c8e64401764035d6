//! Ecosystem simulation engine.
//!
//! A bounded grid populated by plants, animals and predators that age, eat,
//! breed, hibernate and die under a seasonal climate. [`Simulation`] runs
//! the per-step sequence; [`SimulationHandle`] drives it from a worker thread.

pub mod animal;
pub mod clock;
pub mod entity;
pub mod environment;
pub mod grid;
pub mod plant;
pub mod population;
pub mod runner;
pub mod simulation;

pub use animal::{Animal, AnimalProfile, Predator};
pub use clock::{DayClock, StepCounter};
pub use entity::{DeathCause, Entity, StepContext, World};
pub use environment::{ClimateScenario, EnvironmentReading, EnvironmentalClock, Season};
pub use grid::Grid;
pub use plant::{Plant, PlantProfile, PlantState};
pub use population::PopulationTracker;
pub use runner::{SharedSimulation, SimCommand, SimulationHandle, WorkerEvent};
pub use simulation::{RunSwitch, Simulation};
