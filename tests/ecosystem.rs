use anyhow::{bail, Result};
use ecosphere::{
    commands::{Command, CommandError},
    components::{
        biome::BiomeType,
        catastrophe::CatastropheKind,
        health::HealthIndicator,
        resource::ResourceType,
        species::{SpeciesDefinition, TrophicLevel},
    },
    engine::{Engine, EngineBuilder, EngineSettings},
    events::{EventLog, EventObserver, EventRecord},
    scenario::{Scenario, ScenarioLoader},
    spatial::{Coord, RegionId},
    world::World,
};

fn valley() -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load("scenarios/temperate_valley.yaml")
        .unwrap()
}

fn engine_for(scenario: &Scenario) -> EngineBuilder {
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
        snapshot_interval_steps: 0,
        snapshot_dir: std::env::temp_dir(),
    };
    EngineBuilder::new(settings).with_default_systems(&scenario.config)
}

fn run(engine: &mut Engine, world: &mut World, steps: u64) {
    engine.run(world, steps, 10.0).unwrap();
}

struct Broken;

impl EventObserver for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn notify(&mut self, _record: &EventRecord) -> Result<()> {
        bail!("listener offline")
    }
}

#[test]
fn valley_stays_within_bounds() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let mut engine = engine_for(&scenario).build();
    run(&mut engine, &mut world, 60);

    for (_, population) in world.species().iter() {
        assert!(population.current >= 0.0);
        assert!(population.current <= population.max);
        if population.extinct {
            assert_eq!(population.current, 0.0);
        }
    }
    for (_, ledgers) in world.resources().iter() {
        for ledger in ledgers {
            assert!(ledger.availability >= 0.0);
            assert!(ledger.availability <= ledger.capacity + 1e-3);
        }
    }
    let health = world.health().latest().expect("health assessed");
    for (_, score) in health.sub_scores() {
        assert!((0.0..=1.0).contains(&score));
    }
    assert!((0.0..=1.0).contains(&health.overall_score));
    assert!((0.0..=1.0).contains(&world.climate().stability));
}

#[test]
fn same_seed_same_history() {
    let scenario = valley();
    let mut first = scenario.build_world().unwrap();
    let mut second = scenario.build_world().unwrap();
    run(&mut engine_for(&scenario).build(), &mut first, 30);
    run(&mut engine_for(&scenario).build(), &mut second, 30);

    let a = serde_json::to_value(first.snapshot("a")).unwrap();
    let b = serde_json::to_value(second.snapshot("a")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn restored_world_resumes_its_clock() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let mut engine = engine_for(&scenario).build();
    engine
        .submit(
            &mut world,
            Command::SetCatastropheProbability {
                kind: CatastropheKind::Flood,
                probability: 0.0,
            },
        )
        .unwrap();
    engine
        .submit(
            &mut world,
            Command::SetHealthIndicator {
                name: "genetic_diversity".into(),
                value: 0.65,
            },
        )
        .unwrap();
    run(&mut engine, &mut world, 5);
    assert_eq!(world.catastrophes().probability_override(CatastropheKind::Flood), Some(0.0));

    let json = serde_json::to_string(&world).unwrap();
    let mut restored: World = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.time(), world.time());
    assert_eq!(restored.species().len(), world.species().len());
    assert_eq!(
        restored.catastrophes().probability_override(CatastropheKind::Flood),
        Some(0.0)
    );
    assert_eq!(restored.commands().len(), world.commands().len());

    let mut engine = engine_for(&scenario).build();
    let ticks = engine.advance(&mut restored, 10.0).unwrap();
    // One ten-second window: climate 10, biome 1, resource 2, species 3,
    // catastrophe 10; health wakes every 60.
    assert_eq!(ticks, 26);
    assert!((restored.time() - 60.0).abs() < 1e-9);

    run(&mut engine, &mut restored, 6);
    assert_eq!(restored.health().pinned(HealthIndicator::GeneticDiversity), Some(0.65));
    let mut ids: Vec<u64> = restored.active_weather().iter().map(|w| w.id).collect();
    let count = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn commands_reach_their_engines() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let log = EventLog::new(16_384);
    let mut engine = engine_for(&scenario).with_observer(log.clone()).build();

    let newt = SpeciesDefinition {
        id: "newt".into(),
        name: Some("Smooth newt".into()),
        trophic_level: TrophicLevel::SecondaryConsumer,
        preferred_biomes: vec![BiomeType::Wetland],
        primary_resources: vec![ResourceType::Prey, ResourceType::Water],
        territoriality: 0.1,
        aggression: 0.2,
        initial_population: 50.0,
        max_population: 200.0,
        growth_rate: 0.002,
    };
    engine
        .submit(&mut world, Command::RegisterSpecies(newt.clone()))
        .unwrap();
    assert_eq!(
        engine.submit(&mut world, Command::RegisterSpecies(newt.clone())),
        Err(CommandError::DuplicateSpecies("newt".into()))
    );
    assert_eq!(
        engine.submit(
            &mut world,
            Command::RegisterSpecies(SpeciesDefinition {
                id: "wolf".into(),
                ..newt.clone()
            })
        ),
        Err(CommandError::DuplicateSpecies("wolf".into()))
    );

    let wetland = world.grid().id_at(Coord::new(7, 5)).unwrap();
    assert_eq!(world.grid().biome(wetland), Some(BiomeType::Wetland));
    let before = world.resources().get(wetland, ResourceType::Minerals).unwrap().capacity;
    engine
        .submit(
            &mut world,
            Command::AddResourceSource {
                region: wetland,
                kind: ResourceType::Minerals,
                amount: 500.0,
                quality: 0.9,
            },
        )
        .unwrap();
    engine
        .submit(
            &mut world,
            Command::ForceTransition {
                region: RegionId(0),
                biome: BiomeType::Desert,
            },
        )
        .unwrap();
    assert!(matches!(
        engine.submit(
            &mut world,
            Command::SetHealthIndicator {
                name: "charisma".into(),
                value: 0.5,
            }
        ),
        Err(CommandError::UnknownIndicator(_))
    ));
    engine
        .submit(
            &mut world,
            Command::SetHealthIndicator {
                name: "genetic_diversity".into(),
                value: 0.8,
            },
        )
        .unwrap();
    assert!(!world.commands().is_empty());

    // Health wakes every 60 seconds in this scenario.
    run(&mut engine, &mut world, 6);

    assert!(world.commands().is_empty());
    assert!(world.species().contains_key("newt"));
    let after = world.resources().get(wetland, ResourceType::Minerals).unwrap().capacity;
    assert!(after > before);
    assert!(log.count("BiomeTransitionCompleted") >= 1);
    assert_eq!(world.grid().biome(RegionId(0)), Some(BiomeType::Desert));
}

#[test]
fn failing_observer_does_not_stop_the_run() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let log = EventLog::new(65_536);
    let mut engine = engine_for(&scenario)
        .with_observer(Broken)
        .with_observer(log.clone())
        .build();

    run(&mut engine, &mut world, 12);

    assert_eq!(engine.steps(), 12);
    assert!(!log.is_empty());
    assert_eq!(engine.bus().failures(), engine.bus().published());
    assert_eq!(log.len() as u64, engine.bus().published());
}

#[test]
fn stop_handle_halts_between_steps() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let mut engine = engine_for(&scenario).build();
    let handle = engine.stop_handle();

    let mut seen = Vec::new();
    engine
        .run_with_hook(&mut world, 10, 10.0, |report| {
            seen.push(report.step);
            if report.step == 3 {
                handle.stop();
            }
        })
        .unwrap();

    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(engine.steps(), 3);
    assert!((world.time() - 30.0).abs() < 1e-9);

    handle.reset();
    engine.run(&mut world, 1, 10.0).unwrap();
    assert_eq!(engine.steps(), 4);
}

#[test]
fn events_arrive_in_engine_order_within_a_tick() {
    let scenario = valley();
    let mut world = scenario.build_world().unwrap();
    let log = EventLog::new(16_384);
    let mut engine = engine_for(&scenario).with_observer(log.clone()).build();
    run(&mut engine, &mut world, 18);

    let records = log.records();
    assert!(!records.is_empty());
    for pair in records.windows(2) {
        assert!(pair[0].time <= pair[1].time);
        if pair[0].time == pair[1].time {
            assert!(pair[0].source <= pair[1].source);
        }
    }
}
