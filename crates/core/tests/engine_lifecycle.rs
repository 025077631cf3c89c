//! Engine mode transitions, optimizer hand-off and scene persistence

use approx::assert_relative_eq;
use std::thread;
use std::time::{Duration, Instant};
use thedyx_core::{
    CompositeObject, Engine, EngineError, Kelvin, ObjectKind, ObjectRecord, Point, Scene,
    SimulationConfig, SimulationMode,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn new_engine() -> Engine {
    Engine::new(SimulationConfig {
        worker_threads: Some(2),
        ..Default::default()
    })
    .unwrap()
}

fn wait_for_frames(engine: &Engine, frames: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.frames() < frames {
        assert!(Instant::now() < deadline, "frame loop stalled");
        thread::yield_now();
    }
}

fn add_touching_plates(engine: &Engine) {
    let iron = engine.materials().get("Iron").unwrap();
    engine
        .add_object(CompositeObject::rectangle(
            "Left",
            Point::new(0.0, 0.0),
            3,
            3,
            iron.clone(),
            Kelvin::new(600.0),
        ))
        .unwrap();
    engine
        .add_object(CompositeObject::rectangle(
            "Right",
            Point::new(3.0, 0.0),
            3,
            3,
            iron,
            Kelvin::new(300.0),
        ))
        .unwrap();
}

#[test]
fn test_start_optimizes_before_first_frame() {
    let engine = new_engine();
    add_touching_plates(&engine);
    engine.start().unwrap();
    engine.pause();

    let registry = engine.registry();
    let left = registry.get("Left").unwrap();
    let right = registry.get("Right").unwrap();
    for j in 0..3 {
        assert!(!left.cell_at(2, j).unwrap().links().adjacent.is_empty());
        assert_eq!(right.cell_at(0, j).unwrap().adjacent_count(), if j == 1 { 4 } else { 3 });
    }
    assert!(engine.optimizer_progress().iter().all(|&p| p == 100));
}

#[test]
fn test_running_plates_approach_each_other() {
    let engine = new_engine();
    add_touching_plates(&engine);
    engine.start().unwrap();
    wait_for_frames(&engine, 30);
    engine.pause();

    let registry = engine.registry();
    let left = *registry.get("Left").unwrap().cell_at(2, 1).unwrap().temperature();
    let right = *registry.get("Right").unwrap().cell_at(0, 1).unwrap().temperature();
    assert!(left < 600.0);
    assert!(right > 300.0);
    let range = registry.temperature_range().unwrap();
    assert!(*range.biggest <= 600.0);
    assert!(*range.smallest >= 0.0);
}

#[test]
fn test_stop_then_start_resets_temperatures() {
    let engine = new_engine();
    add_touching_plates(&engine);
    engine.start().unwrap();
    wait_for_frames(&engine, 10);
    engine.stop();
    assert_eq!(engine.frames(), 0);
    assert_eq!(engine.simulated_time(), Duration::ZERO);

    engine.start().unwrap();
    engine.pause();
    let frames = engine.frames();
    let registry = engine.registry();
    let cell = registry.get("Left").unwrap().cell_at(0, 0).unwrap();
    // At most `frames` frames of cooling since the reset
    if frames == 0 {
        assert_relative_eq!(*cell.temperature(), 600.0);
    } else {
        assert!(*cell.temperature() < 600.0);
    }
}

#[test]
fn test_resume_reoptimizes_after_move() {
    let engine = new_engine();
    add_touching_plates(&engine);
    engine.start().unwrap();
    engine.pause();
    assert_eq!(engine.mode(), SimulationMode::Paused);

    engine
        .update_object("Right", |object| object.set_position(Point::new(0.0, 10.0)))
        .unwrap();
    assert!(engine.registry().is_topology_dirty());

    engine.start().unwrap();
    engine.pause();
    let registry = engine.registry();
    assert!(!registry.is_topology_dirty());
    let left_edge = registry.get("Left").unwrap().cell_at(2, 1).unwrap();
    assert_eq!(left_edge.adjacent_count(), 3);
}

#[test]
fn test_structural_edits_blocked_while_running() {
    let engine = new_engine();
    add_touching_plates(&engine);
    engine.start().unwrap();
    assert_eq!(engine.clear_objects(), Err(EngineError::Running));
    assert!(matches!(engine.remove_object("Left"), Err(EngineError::Running)));
    assert!(matches!(
        engine.rename_object("Left", "Other"),
        Err(EngineError::Running)
    ));
    engine.stop();
    engine.clear_objects().unwrap();
    assert!(engine.registry().is_empty());
}

#[test]
fn test_every_kind_round_trips() {
    let engine = new_engine();
    let water = engine.materials().get("Water").unwrap();
    let copper = engine.materials().get("Copper").unwrap();
    let objects = [
        CompositeObject::grain_square("Dot", Point::new(-3.0, 1.0), copper.clone(), Kelvin::new(410.0)),
        CompositeObject::state_grain_square("Drop", Point::new(7.0, 7.0), water.clone(), Kelvin::new(280.5))
            .with_gas_allowed(false),
        CompositeObject::rectangle("Slab", Point::new(0.0, 0.0), 6, 2, copper, Kelvin::new(300.0))
            .with_fixed_temperature(true),
        CompositeObject::state_rectangle("Lake", Point::new(10.0, -4.0), 4, 3, water, Kelvin::new(265.0)),
    ];
    for object in objects {
        engine.add_object(object).unwrap();
    }

    let json = engine.scene().to_json_string().unwrap();
    let reloaded = new_engine();
    reloaded.load_scene(&Scene::from_json_str(&json).unwrap()).unwrap();

    let original = engine.registry();
    let restored = reloaded.registry();
    assert_eq!(restored.len(), 4);
    for object in original.objects() {
        let copy = restored.get(object.name()).unwrap();
        assert_eq!(ObjectRecord::from_object(copy), ObjectRecord::from_object(object));
        assert_eq!(copy.kind(), object.kind());
        assert_eq!(copy.position(), object.position());
        assert_eq!(copy.size(), object.size());
        assert_eq!(copy.simulation_temperature(), object.simulation_temperature());
        assert_eq!(copy.material().name, object.material().name);
        assert_eq!(copy.is_fixed_temperature(), object.is_fixed_temperature());
        assert_eq!(copy.is_gas_allowed(), object.is_gas_allowed());
    }
    assert_eq!(
        restored.get("Lake").unwrap().kind(),
        ObjectKind::StateRectangle
    );
}

#[test]
fn test_config_rejected_while_running_and_validated() {
    let engine = new_engine();
    let invalid = SimulationConfig {
        grid_step: 0.0,
        ..Default::default()
    };
    assert!(matches!(engine.set_config(invalid), Err(EngineError::Config(_))));

    engine.start().unwrap();
    assert_eq!(
        engine.set_config(SimulationConfig::default()),
        Err(EngineError::Running)
    );
    engine.stop();
    engine
        .set_config(SimulationConfig {
            updates_per_second: 120,
            worker_threads: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(engine.worker_slots(), 1);
    assert_eq!(engine.config().updates_per_second, 120);
}
