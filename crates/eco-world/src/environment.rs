//! Seasons, temperature and climate drift.

use eco_core::{ClimateScenarioKind, HabitatRecord, LifecycleRules, SeasonRecord};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One of the four seasons of a habitat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    name: String,
    average_temperature: i32,
    swing: i32,
    temperature: i32,
}

impl Season {
    pub fn new(name: impl Into<String>, record: SeasonRecord) -> Self {
        Self {
            name: name.into(),
            average_temperature: record.average_temperature,
            swing: record.swing,
            temperature: record.average_temperature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn average_temperature(&self) -> i32 {
        self.average_temperature
    }

    pub fn temperature(&self) -> i32 {
        self.temperature
    }

    pub fn upper_limit(&self) -> i32 {
        self.average_temperature + self.swing
    }

    pub fn lower_limit(&self) -> i32 {
        self.average_temperature - self.swing
    }

    /// Shift the average by a climate change effect, pulling the current
    /// temperature into the moved band.
    pub fn shift_average(&mut self, delta: i32) {
        self.average_temperature += delta;
        self.temperature = self.temperature.max(self.lower_limit()).min(self.upper_limit());
    }

    /// Move the temperature by up to `swing` degrees in a random direction.
    /// A move that would leave the season's band is dropped.
    pub fn perturb(&mut self, rng: &mut ChaCha8Rng) {
        let warmer = rng.gen_bool(0.5);
        let change = rng.gen_range(0..=self.swing.max(0));
        if warmer {
            if self.temperature + change <= self.upper_limit() {
                self.temperature += change;
            }
        } else if self.temperature - change >= self.lower_limit() {
            self.temperature -= change;
        }
    }
}

/// A temperature drift that compounds once per simulated year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateScenario {
    kind: Option<ClimateScenarioKind>,
    delta: f64,
    growth: f64,
}

impl ClimateScenario {
    pub fn new(kind: ClimateScenarioKind) -> Self {
        Self {
            kind: Some(kind),
            delta: kind.initial_delta(),
            growth: kind.yearly_growth(),
        }
    }

    /// A scenario outside the preset tiers
    pub fn custom(delta: f64, growth: f64) -> Self {
        Self {
            kind: None,
            delta,
            growth,
        }
    }

    pub fn kind(&self) -> Option<ClimateScenarioKind> {
        self.kind
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The current delta rounded to whole degrees
    pub fn effect(&self) -> i32 {
        self.delta.round() as i32
    }

    /// Grow the delta by the yearly percentage. Irreversible.
    pub fn compound(&mut self) {
        self.delta += self.growth * self.delta;
    }

    /// Return the current rounded effect, then compound for next time.
    ///
    /// A convenience for callers stepping a scenario on its own. The
    /// [`EnvironmentalClock`] reads [`effect`](Self::effect) on every season
    /// change and calls [`compound`](Self::compound) once per year instead.
    pub fn apply(&mut self) -> i32 {
        let effect = self.effect();
        self.compound();
        effect
    }
}

/// The environmental reading every entity reacts to during one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    pub temperature: i32,
    pub is_night: bool,
    pub year_passed: bool,
    pub is_spring: bool,
}

/// Season cycle plus climate drift for a habitat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentalClock {
    seasons: Vec<Season>,
    current: usize,
    scenario: ClimateScenario,
    season_length: u64,
}

impl EnvironmentalClock {
    /// The clock starts in spring with the scenario's effect already applied
    /// to the spring average.
    pub fn new(habitat: &HabitatRecord, scenario: ClimateScenario, rules: &LifecycleRules) -> Self {
        let seasons = habitat
            .seasons()
            .into_iter()
            .map(|(name, record)| Season::new(name, record))
            .collect();
        let mut clock = Self {
            seasons,
            current: 0,
            scenario,
            season_length: rules.season_length.max(1),
        };
        clock.apply_climate_effect();
        clock
    }

    pub fn current_season(&self) -> &Season {
        &self.seasons[self.current]
    }

    pub fn season_name(&self) -> &str {
        self.current_season().name()
    }

    pub fn temperature(&self) -> i32 {
        self.current_season().temperature()
    }

    pub fn is_spring(&self) -> bool {
        self.current == 0
    }

    pub fn scenario(&self) -> &ClimateScenario {
        &self.scenario
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    /// True exactly on the step that completes a four-season cycle
    pub fn year_passed(&self, step: u64) -> bool {
        step != 0 && (step + 1) % (self.season_length * 4) == 0
    }

    /// Advance to `step`, the number of the step now being executed.
    pub fn advance(&mut self, step: u64, rng: &mut ChaCha8Rng) {
        if self.year_passed(step) {
            self.scenario.compound();
            debug!(
                event = "climate_compounded",
                step = step,
                delta = self.scenario.delta(),
                "Climate drift compounded"
            );
        }

        if step != 0 && step % self.season_length == 0 {
            self.current = (self.current + 1) % self.seasons.len();
            self.apply_climate_effect();
            debug!(
                event = "season_changed",
                step = step,
                season = self.season_name(),
                average_temperature = self.current_season().average_temperature(),
                "Season changed"
            );
        }

        let current = self.current;
        self.seasons[current].perturb(rng);
    }

    pub fn reading(&self, step: u64, is_night: bool) -> EnvironmentReading {
        EnvironmentReading {
            temperature: self.temperature(),
            is_night,
            year_passed: self.year_passed(step),
            is_spring: self.is_spring(),
        }
    }

    fn apply_climate_effect(&mut self) {
        let effect = self.scenario.effect();
        let current = self.current;
        self.seasons[current].shift_average(effect);
    }
}
