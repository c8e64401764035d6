//! Configuration types for the simulation.
//!
//! These records are plain data handed to the engine by whatever loads them.
//! [`SimulationConfig::validate`] is the single gate every record passes
//! through before any entity is created.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Parameters of one animal species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    /// Species name, also used as the population counter key
    pub name: String,
    /// Predators hunt non-predators and take part in horde fights
    #[serde(default)]
    pub predator: bool,
    /// Highest survivable temperature
    pub max_temperature: i32,
    /// Lowest survivable temperature
    pub min_temperature: i32,
    /// Age (in years) past which an individual dies
    pub max_age: u32,
    /// Age (in years) from which a female can give birth
    pub breeding_age: u32,
    /// Chance per acting step that an eligible female gives birth
    pub breeding_probability: f64,
    /// Upper bound on births in one litter
    pub max_litter_size: u32,
    /// Food yielded to whoever eats an individual
    pub nutritional_value: i32,
    /// Fighting strength, only meaningful for predators
    #[serde(default)]
    pub strength: u32,
    #[serde(default)]
    pub hibernates: bool,
    #[serde(default)]
    pub nocturnal: bool,
}

impl SpeciesRecord {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("species name must not be empty".to_string()));
        }
        check_temperature_range(&self.name, self.min_temperature, self.max_temperature)?;
        check_probability(&self.name, "breeding_probability", self.breeding_probability)?;
        if self.max_age == 0 {
            return Err(Error::Validation(format!("{}: max_age must be positive", self.name)));
        }
        if self.max_litter_size == 0 {
            return Err(Error::Validation(format!(
                "{}: max_litter_size must be at least 1",
                self.name
            )));
        }
        // Initial food is drawn from [nv/2, nv), which needs nv >= 2.
        if self.nutritional_value < 2 {
            return Err(Error::Validation(format!(
                "{}: nutritional_value must be at least 2",
                self.name
            )));
        }
        if self.predator && self.strength == 0 {
            return Err(Error::Validation(format!(
                "{}: predators need a positive strength",
                self.name
            )));
        }
        Ok(())
    }
}

/// Parameters of the plant species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub name: String,
    pub max_temperature: i32,
    pub min_temperature: i32,
    pub nutritional_value: i32,
    /// Chance per daytime step of seeding one neighbouring cell
    pub reproduction_probability: f64,
    pub max_health: i32,
}

impl PlantRecord {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("plant name must not be empty".to_string()));
        }
        check_temperature_range(&self.name, self.min_temperature, self.max_temperature)?;
        check_probability(&self.name, "reproduction_probability", self.reproduction_probability)?;
        if self.nutritional_value < 0 {
            return Err(Error::Validation(format!(
                "{}: nutritional_value must not be negative",
                self.name
            )));
        }
        if self.max_health < 1 {
            return Err(Error::Validation(format!(
                "{}: max_health must be at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Average temperature of a season and how far it may swing either way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub average_temperature: i32,
    pub swing: i32,
}

impl SeasonRecord {
    pub fn new(average_temperature: i32, swing: i32) -> Self {
        Self {
            average_temperature,
            swing,
        }
    }
}

/// Climate and plant cover of the simulated habitat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitatRecord {
    pub name: String,
    pub spring: SeasonRecord,
    pub summer: SeasonRecord,
    pub autumn: SeasonRecord,
    pub winter: SeasonRecord,
    /// Fraction of the field seeded with plants (0.0 to 1.0)
    pub plant_concentration: f64,
}

impl HabitatRecord {
    /// Seasons in cyclic order, starting with spring.
    pub fn seasons(&self) -> [(&'static str, SeasonRecord); 4] {
        [
            ("spring", self.spring),
            ("summer", self.summer),
            ("autumn", self.autumn),
            ("winter", self.winter),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (season, record) in self.seasons() {
            if record.swing < 0 {
                return Err(Error::Validation(format!(
                    "{}: {} swing must not be negative",
                    self.name, season
                )));
            }
        }
        check_probability(&self.name, "plant_concentration", self.plant_concentration)
    }
}

/// Preset climate change tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateScenarioKind {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ClimateScenarioKind {
    pub fn all() -> [ClimateScenarioKind; 4] {
        [
            ClimateScenarioKind::None,
            ClimateScenarioKind::Low,
            ClimateScenarioKind::Medium,
            ClimateScenarioKind::High,
        ]
    }

    /// Degrees added to a season's average when the scenario first applies
    pub fn initial_delta(&self) -> f64 {
        match self {
            ClimateScenarioKind::None => 0.0,
            ClimateScenarioKind::Low => 1.0,
            ClimateScenarioKind::Medium => 2.0,
            ClimateScenarioKind::High => 3.0,
        }
    }

    /// Fraction by which the delta compounds every simulated year
    pub fn yearly_growth(&self) -> f64 {
        match self {
            ClimateScenarioKind::None => 0.0,
            ClimateScenarioKind::Low => 0.05,
            ClimateScenarioKind::Medium => 0.15,
            ClimateScenarioKind::High => 0.30,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClimateScenarioKind::None => "none",
            ClimateScenarioKind::Low => "low",
            ClimateScenarioKind::Medium => "medium",
            ClimateScenarioKind::High => "high",
        }
    }
}

impl fmt::Display for ClimateScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ClimateScenarioKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Validation(format!("unknown climate scenario: {s}")))
    }
}

/// Tunable constants of the life-cycle rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRules {
    /// Steps per season; a year is four seasons
    pub season_length: u64,
    /// Steps between day/night toggles
    pub day_length_steps: u64,
    /// A hibernating animal acts once every this many steps
    pub hibernation_stay_steps: u32,
    /// Hibernation starts at or below `min_temperature + margin`
    pub hibernation_margin: i32,
    /// Chance that an animal dies on a step spent outside its range
    pub temperature_death_probability: f64,
    /// Chance per daytime step that a living plant heals by one
    pub plant_heal_probability: f64,
    /// Animals stop eating once food reaches `factor * nutritional_value`
    pub satiety_factor: f64,
}

impl Default for LifecycleRules {
    fn default() -> Self {
        Self {
            season_length: 50,
            day_length_steps: 1,
            hibernation_stay_steps: 10,
            hibernation_margin: 5,
            temperature_death_probability: 0.8,
            plant_heal_probability: 0.1,
            satiety_factor: 1.5,
        }
    }
}

impl LifecycleRules {
    /// Steps in one simulated year
    pub fn year_length(&self) -> u64 {
        self.season_length * 4
    }

    pub fn validate(&self) -> Result<()> {
        if self.season_length == 0 || self.day_length_steps == 0 {
            return Err(Error::Validation(
                "season_length and day_length_steps must be positive".to_string(),
            ));
        }
        if self.hibernation_stay_steps == 0 {
            return Err(Error::Validation(
                "hibernation_stay_steps must be positive".to_string(),
            ));
        }
        check_probability("rules", "temperature_death_probability", self.temperature_death_probability)?;
        check_probability("rules", "plant_heal_probability", self.plant_heal_probability)?;
        if self.satiety_factor.is_nan() || self.satiety_factor <= 0.0 {
            return Err(Error::Validation("satiety_factor must be positive".to_string()));
        }
        Ok(())
    }
}

/// How many individuals of a species to place at start-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationEntry {
    pub species: String,
    pub count: usize,
}

impl PopulationEntry {
    pub fn new(species: impl Into<String>, count: usize) -> Self {
        Self {
            species: species.into(),
            count,
        }
    }
}

/// Complete description of one simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Field height
    pub rows: usize,
    /// Field width
    pub cols: usize,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Whether the first step starts at night
    pub start_at_night: bool,
    /// Give initial animals a random age in [0, max_age)
    pub random_initial_age: bool,
    pub habitat: HabitatRecord,
    pub scenario: ClimateScenarioKind,
    pub plant: PlantRecord,
    /// Catalogue of animal species available to the populations below
    pub species: Vec<SpeciesRecord>,
    /// Initial populations, placed in this order
    pub populations: Vec<PopulationEntry>,
    pub rules: LifecycleRules,
    /// Number of steps in a "long" run
    pub long_run_steps: u64,
    /// Cosmetic pause between steps when driven from a worker thread
    pub step_delay_ms: u64,
    /// Emit a population snapshot log every this many steps (0 disables)
    pub status_log_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: 80,
            cols: 120,
            seed: 0,
            start_at_night: false,
            random_initial_age: true,
            habitat: HabitatRecord {
                name: "temperate".to_string(),
                spring: SeasonRecord::new(12, 4),
                summer: SeasonRecord::new(22, 5),
                autumn: SeasonRecord::new(11, 4),
                winter: SeasonRecord::new(0, 5),
                plant_concentration: 0.15,
            },
            scenario: ClimateScenarioKind::None,
            plant: PlantRecord {
                name: "plant".to_string(),
                max_temperature: 40,
                min_temperature: 2,
                nutritional_value: 6,
                reproduction_probability: 0.05,
                max_health: 3,
            },
            species: vec![
                SpeciesRecord {
                    name: "rabbit".to_string(),
                    predator: false,
                    max_temperature: 35,
                    min_temperature: -5,
                    max_age: 6,
                    breeding_age: 1,
                    breeding_probability: 0.12,
                    max_litter_size: 4,
                    nutritional_value: 20,
                    strength: 0,
                    hibernates: false,
                    nocturnal: false,
                },
                SpeciesRecord {
                    name: "hedgehog".to_string(),
                    predator: false,
                    max_temperature: 32,
                    min_temperature: 0,
                    max_age: 7,
                    breeding_age: 1,
                    breeding_probability: 0.08,
                    max_litter_size: 3,
                    nutritional_value: 14,
                    strength: 0,
                    hibernates: true,
                    nocturnal: true,
                },
                SpeciesRecord {
                    name: "fox".to_string(),
                    predator: true,
                    max_temperature: 35,
                    min_temperature: -10,
                    max_age: 8,
                    breeding_age: 2,
                    breeding_probability: 0.06,
                    max_litter_size: 3,
                    nutritional_value: 30,
                    strength: 4,
                    hibernates: false,
                    nocturnal: true,
                },
                SpeciesRecord {
                    name: "wolf".to_string(),
                    predator: true,
                    max_temperature: 30,
                    min_temperature: -20,
                    max_age: 10,
                    breeding_age: 2,
                    breeding_probability: 0.05,
                    max_litter_size: 3,
                    nutritional_value: 40,
                    strength: 7,
                    hibernates: false,
                    nocturnal: false,
                },
            ],
            populations: vec![
                PopulationEntry::new("rabbit", 400),
                PopulationEntry::new("hedgehog", 150),
                PopulationEntry::new("fox", 80),
                PopulationEntry::new("wolf", 30),
            ],
            rules: LifecycleRules::default(),
            long_run_steps: 2000,
            step_delay_ms: 0,
            status_log_interval: 100,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a species by name in the catalogue
    pub fn species(&self, name: &str) -> Option<&SpeciesRecord> {
        self.species.iter().find(|s| s.name == name)
    }

    pub fn area(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of plants seeded at start-up
    pub fn plant_count(&self) -> usize {
        (self.area() as f64 * self.habitat.plant_concentration) as usize
    }

    /// Number of animals requested by the population list
    pub fn animal_count(&self) -> usize {
        self.populations.iter().map(|p| p.count).sum()
    }

    /// Check every record and the population request against the field.
    ///
    /// Fails with [`Error::Validation`] or [`Error::NotFound`] for malformed
    /// input and [`Error::Capacity`] when the requested population does not
    /// fit on the field.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::Validation(format!(
                "field dimensions must be positive, got {}x{}",
                self.rows, self.cols
            )));
        }
        self.rules.validate()?;
        self.habitat.validate()?;
        self.plant.validate()?;

        let mut names = HashSet::new();
        names.insert(self.plant.name.as_str());
        for species in &self.species {
            species.validate()?;
            if !names.insert(species.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate species name: {}",
                    species.name
                )));
            }
        }

        let mut requested = HashSet::new();
        for entry in &self.populations {
            if self.species(&entry.species).is_none() {
                return Err(Error::NotFound(format!("species {}", entry.species)));
            }
            if !requested.insert(entry.species.as_str()) {
                return Err(Error::Validation(format!(
                    "species {} listed twice in populations",
                    entry.species
                )));
            }
        }

        let wanted = self.plant_count() + self.animal_count();
        if wanted > self.area() {
            return Err(Error::Capacity(format!(
                "{} plants and {} animals do not fit on a {}x{} field",
                self.plant_count(),
                self.animal_count(),
                self.rows,
                self.cols
            )));
        }
        Ok(())
    }
}

fn check_temperature_range(name: &str, min: i32, max: i32) -> Result<()> {
    if min > max {
        return Err(Error::Validation(format!(
            "{name}: min_temperature {min} is above max_temperature {max}"
        )));
    }
    Ok(())
}

fn check_probability(name: &str, field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Validation(format!(
            "{name}: {field} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
