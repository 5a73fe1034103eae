//! End-to-end pipeline: configuration -> advance -> stencils -> forces.

use std::path::Path;
use std::sync::{Arc, Mutex};

use kernel::{BoundaryRecords, FieldBuffers, IbError, IbMethod, NodeFamily, NodeRole, TagChurn, TagObserver};
use orchestrator::{
    BodyConfig, GridConfig, IbConfig, ImmersedBoundarySystem, Motion, ShapeConfig,
};

fn cylinder_config(motion: Motion, method: IbMethod) -> IbConfig {
    IbConfig {
        name: "moving cylinder".to_string(),
        grid: GridConfig::Uniform { nx: 80, ny: 40, x_min: 0.0, x_max: 2.0, y_min: 0.0, y_max: 1.0 },
        bodies: vec![BodyConfig {
            shape: ShapeConfig::Circle { center: [0.6, 0.5], radius: 0.15, points: 120 },
            motion,
        }],
        method,
        scale_cv: 2.0,
        nu: 0.01,
        probe_factor: 1.5,
        min_probe: 0.1,
        on_boundary_tol: 1e-9,
        max_cell_jump: 1,
    }
}

/// Observer that shares its history with the test.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<TagChurn>>>);

impl TagObserver for Recorder {
    fn observe(&mut self, churn: &TagChurn) {
        if let Ok(mut passes) = self.0.lock() {
            passes.push(*churn);
        }
    }
}

#[test]
fn translating_cylinder_runs_every_pass() {
    let config = cylinder_config(Motion::Translation { velocity: [1.0, 0.0] }, IbMethod::SharpInterface);
    let recorder = Recorder::default();
    let mut system = ImmersedBoundarySystem::from_config(config, Path::new("."))
        .unwrap()
        .with_observer(Box::new(recorder.clone()));

    let dt = 0.01;
    for step in 0..5u64 {
        let time = step as f64 * dt;
        let churn = system.advance(time, step, dt).unwrap();
        system.tags().verify_partition().unwrap();
        assert!(churn.roles[2].ghost > 0);

        // Flow moving with the body: no slip anywhere, no pressure.
        let field = FieldBuffers::from_fn(system.grid(), |_, _| 1.0, |_, _| 0.0, |_, _| 0.0);
        system.build_stencils(&field.view(dt)).unwrap();
        let records = system.records();
        for family in NodeFamily::ALL {
            assert_eq!(records.len(family), system.tags().boundary_nodes(family).len());
        }
        let BoundaryRecords::Image(image) = records else {
            panic!("sharp interface builds image records");
        };
        for r in &image[0] {
            assert!((r.node_value - 1.0).abs() < 1e-9);
        }

        let forces = system.compute_forces(&field.view(dt)).unwrap();
        let f = forces.bodies[0];
        assert!(f.net_force[0].abs() < 1e-9, "step {}: {:?}", step, f);
        assert!(f.net_force[1].abs() < 1e-9, "step {}: {:?}", step, f);
    }

    let passes = recorder.0.lock().unwrap();
    assert_eq!(passes.len(), 5);
    assert!(passes[1..].iter().all(|c| c.total_changed() > 0));
    assert_eq!(system.clock(), (0.04, 4));
    // The body moved 0.04 to the right.
    assert!((system.registry().markers.x[0] - 0.79).abs() < 1e-12);
}

#[test]
fn static_body_has_no_churn_after_first_pass() {
    let config = cylinder_config(Motion::Static, IbMethod::SharpInterface);
    let mut system = ImmersedBoundarySystem::from_config(config, Path::new(".")).unwrap();
    let first = system.advance(0.0, 0, 0.01).unwrap();
    assert!(first.total_changed() > 0);
    let tags = system.tags().clone();
    let second = system.advance(0.01, 1, 0.01).unwrap();
    assert_eq!(second.total_changed(), 0);
    assert_eq!(&tags, system.tags());
}

#[test]
fn direct_forcing_builds_axis_records() {
    let config = cylinder_config(Motion::Static, IbMethod::DirectForcing);
    let mut system = ImmersedBoundarySystem::from_config(config, Path::new(".")).unwrap();
    system.advance(0.0, 0, 0.01).unwrap();
    let field = FieldBuffers::from_fn(system.grid(), |_, _| 0.0, |_, _| 0.0, |_, _| 1.0);
    let records = system.build_stencils(&field.view(0.01)).unwrap().clone();
    let BoundaryRecords::Axis(axis) = &records else {
        panic!("direct forcing builds axis records");
    };
    let p_tags = system.family_tags(NodeFamily::P);
    for r in &axis[2] {
        assert!(matches!(p_tags.role(r.partner), NodeRole::Fluid | NodeRole::Hybrid));
        assert!((r.node_value - 1.0).abs() < 1e-12);
    }
    assert_eq!(axis[2].len(), system.tags().boundary_nodes(NodeFamily::P).len());
}

#[test]
fn oversized_step_is_a_geometry_error() {
    let config = cylinder_config(Motion::Translation { velocity: [10.0, 0.0] }, IbMethod::SharpInterface);
    let mut system = ImmersedBoundarySystem::from_config(config, Path::new(".")).unwrap();
    system.advance(0.0, 0, 0.01).unwrap();
    let before = system.tags().clone();
    let err = system.advance(0.01, 1, 0.01).unwrap_err();
    assert!(matches!(err, IbError::GeometrySearch { axis: 'x', .. }), "{}", err);
    // Tags of the failed step are not published.
    assert_eq!(&before, system.tags());
}

#[test]
fn marker_file_bodies_load_relative_to_config() {
    let dir = std::env::temp_dir().join(format!("ibm-pipeline-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("square.txt"), "4\n0.8 0.3\n1.2 0.3\n1.2 0.7\n0.8 0.7\n").unwrap();
    let json = r#"{
        "name": "square",
        "grid": { "Uniform": { "nx": 40, "ny": 20, "x_min": 0.0, "x_max": 2.0, "y_min": 0.0, "y_max": 1.0 } },
        "bodies": [ { "shape": { "File": { "path": "square.txt" } } } ],
        "method": "DirectForcing"
    }"#;
    let config_path = dir.join("case.json");
    std::fs::write(&config_path, json).unwrap();

    let mut system = ImmersedBoundarySystem::from_file(&config_path).unwrap();
    assert_eq!(system.registry().total_points(), 4);
    assert_eq!(system.config().method, IbMethod::DirectForcing);
    system.advance(0.0, 0, 0.01).unwrap();
    assert!(system.family_tags(NodeFamily::P).count(NodeRole::Solid) > 0);

    std::fs::remove_dir_all(&dir).ok();
}
