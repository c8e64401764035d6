//! Whole-simulation behaviour on seeded and hand-placed fields.

use eco_core::{
    Coordinate, HabitatRecord, LifecycleRules, PlantRecord, PopulationEntry, SeasonRecord, Sex,
    SimulationConfig, StopReason,
};
use eco_world::{
    Animal, AnimalProfile, Entity, Plant, PlantProfile, PlantState, Predator, Simulation, World,
};
use std::collections::HashSet;
use std::sync::Arc;

fn mild_habitat() -> HabitatRecord {
    HabitatRecord {
        name: "mild".to_string(),
        spring: SeasonRecord::new(15, 0),
        summer: SeasonRecord::new(15, 0),
        autumn: SeasonRecord::new(15, 0),
        winter: SeasonRecord::new(15, 0),
        plant_concentration: 0.0,
    }
}

fn breeder(nocturnal: bool) -> Arc<AnimalProfile> {
    Arc::new(AnimalProfile {
        name: "vole".to_string(),
        max_temperature: 40,
        min_temperature: -10,
        nutritional_value: 10,
        reproduction_probability: 1.0,
        max_age: 50,
        breeding_age: 0,
        max_litter_size: 1,
        hibernates: false,
        nocturnal,
    })
}

fn hand_built(rows: usize, cols: usize) -> SimulationConfig {
    SimulationConfig {
        rows,
        cols,
        habitat: mild_habitat(),
        populations: Vec::new(),
        ..Default::default()
    }
}

fn add_animal(world: &mut World, profile: &Arc<AnimalProfile>, cell: Coordinate, sex: Sex) {
    let id = world.allocate_id();
    world
        .insert(Entity::Animal(Animal::new(id, Arc::clone(profile), cell, sex, 1, 40)))
        .unwrap();
}

/// Every occupied cell points at a living entity that agrees on its location,
/// and every living entity sits on its own cell.
fn assert_grid_consistent(world: &World) {
    for (cell, occupant) in world.grid().iter() {
        if let Some(id) = occupant {
            let entity = world.get(id).expect("occupant missing from world");
            assert!(entity.is_alive(), "dead entity {id} still on {cell}");
            assert_eq!(entity.location(), Some(cell));
        }
    }
    for entity in world.entities() {
        if entity.is_alive() {
            let cell = entity.location().expect("living entity without a cell");
            assert_eq!(world.grid().get(cell), Some(entity.id()));
        }
    }
}

#[test]
fn seeded_run_keeps_grid_and_counts_consistent() {
    let mut config = SimulationConfig {
        rows: 30,
        cols: 30,
        seed: 2024,
        ..Default::default()
    };
    config.rules.season_length = 10;
    config.populations = vec![
        PopulationEntry::new("rabbit", 60),
        PopulationEntry::new("hedgehog", 20),
        PopulationEntry::new("fox", 12),
        PopulationEntry::new("wolf", 6),
    ];

    let mut sim = Simulation::new(config).unwrap();
    for _ in 0..120 {
        if sim.step().unwrap().is_none() {
            break;
        }
        assert_grid_consistent(sim.world());
        let occupied = sim.snapshot().occupied();
        assert_eq!(sim.counts().total(), occupied);
    }
    assert_eq!(sim.step_count(), 120);
}

#[test]
fn all_male_population_never_breeds() {
    let profile = breeder(true);
    let mut world = World::new(6, 6);
    for cell in [(0, 0), (0, 1), (1, 0), (1, 1), (3, 3), (3, 4)] {
        add_animal(&mut world, &profile, Coordinate::new(cell.0, cell.1), Sex::Male);
    }
    let mut sim = Simulation::from_world(hand_built(6, 6), world).unwrap();
    for _ in 0..60 {
        sim.step().unwrap();
    }
    assert_eq!(sim.births(), 0);
    let ids: HashSet<_> = sim.world().entities().map(Entity::id).collect();
    assert!(ids.iter().all(|id| id.0 < 6));
}

#[test]
fn newborns_do_not_act_in_their_birth_step() {
    // 2x2 field: mother and father on the top row. Every move below has
    // exactly one free cell to choose from.
    let profile = breeder(true);
    let mut world = World::new(2, 2);
    add_animal(&mut world, &profile, Coordinate::new(0, 0), Sex::Female);
    add_animal(&mut world, &profile, Coordinate::new(0, 1), Sex::Male);

    let mut sim = Simulation::from_world(hand_built(2, 2), world).unwrap();
    sim.step().unwrap();

    // Newborn lands on (1, 0); mother moves to (1, 1), father to (0, 0).
    // Had the newborn acted it would have taken the vacated (0, 1).
    assert_eq!(sim.births(), 1);
    assert_eq!(sim.deaths(), 0);
    assert_eq!(sim.live_count(), 3);
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.species_at(Coordinate::new(1, 0)), Some("vole"));
    assert_eq!(snapshot.species_at(Coordinate::new(0, 1)), None);

    // Next step it acts like everyone else and leaves its birth cell.
    sim.step().unwrap();
    assert_eq!(sim.snapshot().species_at(Coordinate::new(1, 0)), None);
}

#[test]
fn prey_eaten_mid_step_never_acts() {
    // 1x3 field: stoat, vole, free cell. The stoat acts first.
    let stoat = Arc::new(AnimalProfile {
        name: "stoat".to_string(),
        ..(*breeder(true)).clone()
    });
    let vole = breeder(true);
    let mut world = World::new(1, 3);
    let hunter = world.allocate_id();
    world
        .insert(Entity::Predator(Predator::new(
            Animal::new(hunter, stoat, Coordinate::new(0, 0), Sex::Male, 1, 1),
            3,
        )))
        .unwrap();
    let prey = world.allocate_id();
    world
        .insert(Entity::Animal(Animal::new(prey, vole, Coordinate::new(0, 1), Sex::Male, 1, 40)))
        .unwrap();
    assert!(hunter < prey);

    let mut sim = Simulation::from_world(hand_built(1, 3), world).unwrap();
    sim.step().unwrap();

    assert_eq!(sim.deaths(), 1);
    assert_eq!(sim.live_count(), 1);
    assert!(sim.world().get(prey).is_none());
    assert_eq!(sim.world().grid().get(Coordinate::new(0, 1)), Some(hunter));
    assert!(sim.world().grid().is_free(Coordinate::new(0, 2)));
    assert_grid_consistent(sim.world());

    sim.step().unwrap();
    assert_eq!(sim.deaths(), 1);
}

#[test]
fn dormant_plant_regrows_in_place_next_spring() {
    let mut config = hand_built(3, 3);
    config.habitat.winter = SeasonRecord::new(-10, 0);
    config.rules = LifecycleRules {
        season_length: 2,
        ..Default::default()
    };
    config.plant = PlantRecord {
        name: "clover".to_string(),
        max_temperature: 30,
        min_temperature: 0,
        nutritional_value: 3,
        reproduction_probability: 0.0,
        max_health: 2,
    };

    let cell = Coordinate::new(1, 1);
    let mut world = World::new(3, 3);
    let id = world.allocate_id();
    let profile = Arc::new(PlantProfile::from(&config.plant));
    world
        .insert(Entity::Plant(Plant::new(id, profile, cell, config.plant.max_health)))
        .unwrap();

    let mut sim = Simulation::from_world(config, world).unwrap();
    let plant_state = |sim: &Simulation| match sim.world().get(id) {
        Some(Entity::Plant(plant)) => plant.state(),
        other => panic!("plant missing: {other:?}"),
    };

    // Winter begins on step 6.
    for _ in 0..5 {
        sim.step().unwrap();
    }
    assert_eq!(plant_state(&sim), PlantState::Alive);

    sim.step().unwrap();
    assert_eq!(sim.environment().season_name(), "winter");
    assert_eq!(plant_state(&sim), PlantState::Dormant);
    assert!(sim.world().grid().is_free(cell));
    assert_eq!(sim.live_count(), 1);
    assert_eq!(sim.world().get(id).and_then(Entity::location), Some(cell));

    sim.step().unwrap();
    assert_eq!(plant_state(&sim), PlantState::Dormant);

    // Spring, daytime, survivable: back on its old cell at full health.
    sim.step().unwrap();
    assert_eq!(sim.environment().season_name(), "spring");
    assert!(!sim.is_night());
    assert_eq!(plant_state(&sim), PlantState::Alive);
    assert_eq!(sim.world().grid().get(cell), Some(id));
}

#[test]
fn lone_species_is_not_viable() {
    let mut world = World::new(4, 4);
    let id = world.allocate_id();
    let config = hand_built(4, 4);
    let profile = Arc::new(PlantProfile::from(&config.plant));
    world
        .insert(Entity::Plant(Plant::new(id, profile, Coordinate::new(2, 2), 3)))
        .unwrap();

    let mut sim = Simulation::from_world(config, world).unwrap();
    assert!(!sim.is_viable());
    let summary = sim.simulate(25).unwrap();
    assert_eq!(summary.stop_reason, StopReason::NotViable);
    assert_eq!(summary.steps_executed, 0);
}

#[test]
fn json_config_drives_a_long_run() {
    let json = r#"{
        "rows": 25,
        "cols": 25,
        "seed": 99,
        "scenario": "high",
        "long_run_steps": 40,
        "populations": [
            { "species": "rabbit", "count": 40 },
            { "species": "fox", "count": 8 }
        ]
    }"#;
    let config = SimulationConfig::from_json_str(json).unwrap();
    let mut sim = Simulation::new(config).unwrap();
    let summary = sim.run_long().unwrap();

    assert!(summary.steps_executed <= 40);
    assert_eq!(summary.final_step, summary.steps_executed);
    if summary.stop_reason == StopReason::Completed {
        assert_eq!(summary.steps_executed, 40);
    }
    assert_grid_consistent(sim.world());
}

#[test]
fn status_serializes_for_renderers() {
    let mut config = SimulationConfig {
        rows: 12,
        cols: 12,
        seed: 5,
        ..Default::default()
    };
    config.populations = vec![PopulationEntry::new("rabbit", 10)];
    let mut sim = Simulation::new(config).unwrap();
    let status = sim.step().unwrap().unwrap();

    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(value["step"], 1);
    assert_eq!(value["season"], "spring");
    assert!(value["time_of_day"].as_str().unwrap().starts_with("Night"));
}
