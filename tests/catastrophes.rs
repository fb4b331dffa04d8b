use ecosphere::{
    commands::{Command, CommandError},
    components::{biome::BiomeType, catastrophe::CatastropheKind},
    config::SimulationConfig,
    engine::{Engine, EngineBuilder, EngineSettings},
    events::EventLog,
    spatial::{Coord, RegionId, RegionalGrid},
    world::World,
};

fn quiet_config(radius: f32, duration: f32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    for settings in &mut config.catastrophe.types {
        settings.base_probability = 0.0;
        settings.min_radius = radius;
        settings.max_radius = radius;
        settings.min_duration = duration;
        settings.max_duration = duration;
    }
    config
}

fn build(config: &SimulationConfig, log: &EventLog) -> Engine {
    let settings = EngineSettings {
        scenario_name: "catastrophes".into(),
        seed: 99,
        snapshot_interval_steps: 0,
        snapshot_dir: std::env::temp_dir(),
    };
    EngineBuilder::new(settings)
        .with_default_systems(config)
        .with_observer(log.clone())
        .build()
}

fn region(world: &World, x: i32, y: i32) -> RegionId {
    world.grid().id_at(Coord::new(x, y)).unwrap()
}

#[test]
fn wildfire_falloff_matches_distance() {
    let config = quiet_config(20.0, 50.0);
    let mut world = World::new(RegionalGrid::new(30, 30, BiomeType::Grassland), &config);
    let log = EventLog::new(4096);
    let mut engine = build(&config, &log);

    let epicenter = region(&world, 0, 0);
    engine
        .submit(
            &mut world,
            Command::TriggerCatastropheAt {
                kind: CatastropheKind::Wildfire,
                region: epicenter,
                intensity: 1.0,
            },
        )
        .unwrap();
    engine.advance(&mut world, 1.0).unwrap();

    assert_eq!(log.count("CatastropheTriggered"), 1);
    let event = &world.catastrophes().active()[0];
    let weight_at = |id: RegionId| {
        event
            .affected
            .iter()
            .find(|(r, _)| *r == id)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    };
    assert!((weight_at(region(&world, 10, 0)) - 0.5).abs() < 1e-5);
    assert!((weight_at(region(&world, 6, 8)) - 0.5).abs() < 1e-5);
    assert_eq!(weight_at(region(&world, 25, 0)), 0.0);
    assert_eq!(weight_at(epicenter), 1.0);

    let near = world.overrides().region(region(&world, 5, 0)).severity;
    let mid = world.overrides().region(region(&world, 10, 0)).severity;
    let far = world.overrides().region(region(&world, 15, 0)).severity;
    assert!(near > mid && mid > far && far > 0.0);
    assert!(world.overrides().region(region(&world, 25, 0)).is_neutral());
}

#[test]
fn manual_flood_runs_to_resolution() {
    let config = quiet_config(3.0, 10.0);
    let mut world = World::new(RegionalGrid::new(12, 12, BiomeType::Wetland), &config);
    let log = EventLog::new(8192);
    let mut engine = build(&config, &log);
    let target = region(&world, 6, 6);

    engine
        .submit(
            &mut world,
            Command::TriggerCatastropheAt {
                kind: CatastropheKind::Flood,
                region: target,
                intensity: 0.6,
            },
        )
        .unwrap();

    // Duration 10 plus recovery of twice that, with slack.
    for _ in 0..40 {
        engine.advance(&mut world, 1.0).unwrap();
    }

    assert_eq!(log.count("CatastropheTriggered"), 1);
    assert_eq!(log.count("CatastropheEnded"), 1);
    assert_eq!(log.count("RecoveryProgress"), 4);
    assert_eq!(log.count("CatastropheResolved"), 1);
    assert!(world.catastrophes().active().is_empty());
    assert_eq!(world.catastrophes().archive().len(), 1);
    assert_eq!(world.catastrophes().occurrences(CatastropheKind::Flood), 1);
    assert!(!world.catastrophes().is_region_affected(target));
    assert_eq!(world.overrides().affected_regions(), 0);

    let names: Vec<&str> = log
        .records()
        .iter()
        .map(|r| r.event.name())
        .filter(|n| n.starts_with("Catastrophe"))
        .collect();
    assert_eq!(
        names,
        vec!["CatastropheTriggered", "CatastropheEnded", "CatastropheResolved"]
    );
}

#[test]
fn second_trigger_on_affected_region_is_rejected() {
    let config = quiet_config(2.0, 30.0);
    let mut world = World::new(RegionalGrid::new(8, 8, BiomeType::Grassland), &config);
    let log = EventLog::new(1024);
    let mut engine = build(&config, &log);
    let target = region(&world, 3, 3);
    let trigger = Command::TriggerCatastropheAt {
        kind: CatastropheKind::Wildfire,
        region: target,
        intensity: 0.5,
    };

    engine.submit(&mut world, trigger.clone()).unwrap();
    assert_eq!(
        engine.submit(&mut world, trigger.clone()),
        Err(CommandError::RegionAffected(target))
    );
    engine.advance(&mut world, 1.0).unwrap();
    assert_eq!(
        engine.submit(&mut world, trigger),
        Err(CommandError::RegionAffected(target))
    );
    assert_eq!(log.count("CatastropheTriggered"), 1);
}

#[test]
fn trigger_outside_grid_is_rejected() {
    let config = quiet_config(2.0, 5.0);
    let mut world = World::new(RegionalGrid::new(4, 4, BiomeType::Grassland), &config);
    let log = EventLog::new(16);
    let engine = build(&config, &log);
    let result = engine.submit(
        &mut world,
        Command::TriggerCatastropheAt {
            kind: CatastropheKind::Plague,
            region: RegionId(400),
            intensity: 0.5,
        },
    );
    assert_eq!(result, Err(CommandError::UnknownRegion(RegionId(400))));
}
