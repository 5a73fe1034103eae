//! Surface force integration against analytic fields.
//!
//! The probe distance is kept above a cell diagonal so every probe stencil
//! is made of fluid nodes and linear fields are sampled exactly.

use std::f64::consts::PI;

use kernel::{
    BodyRegistry, FieldBuffers, ForceIntegrator, MarkerLocator, NodeTagger, Sampler, StaggeredGrid, TagSet,
};

const N: usize = 64;
const R: f64 = 0.25;
const MARKERS: usize = 96;
const PROBE: f64 = 1.5;

fn setup() -> (StaggeredGrid, BodyRegistry, TagSet) {
    let grid = StaggeredGrid::uniform(N, N, 0.0, 1.0, 0.0, 1.0).unwrap();
    let points: Vec<(f64, f64)> = (0..MARKERS)
        .map(|k| {
            let th = 2.0 * PI * k as f64 / MARKERS as f64;
            (0.5 + R * th.cos(), 0.5 + R * th.sin())
        })
        .collect();
    let mut reg = BodyRegistry::new();
    reg.add_body(&points).unwrap();
    MarkerLocator::new(2.0, 1).update(&grid, &mut reg).unwrap();
    let mut tags = TagSet::new(&grid);
    NodeTagger::default().tag(&grid, &reg, &mut tags).unwrap();
    (grid, reg, tags)
}

fn perimeter(reg: &BodyRegistry) -> f64 {
    (0..reg.total_points()).map(|k| reg.segment_length(k)).sum()
}

#[test]
fn uniform_pressure_gives_zero_net_force() {
    let (grid, reg, tags) = setup();
    let field = FieldBuffers::from_fn(&grid, |_, _| 0.0, |_, _| 0.0, |_, _| 3.0);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    let integrator = ForceIntegrator { probe_factor: PROBE, nu: 0.01 };
    let report = integrator.compute(&sampler).unwrap();

    assert_eq!(report.bodies.len(), 1);
    assert_eq!(report.markers.len(), MARKERS);
    let f = report.bodies[0];
    eprintln!("net force: {:?}", f.net_force);
    assert!(f.net_force[0].abs() < 1e-10);
    assert!(f.net_force[1].abs() < 1e-10);
    assert_eq!(f.viscous_force, [0.0, 0.0]);
    for m in &report.markers {
        assert!((m.pressure - 3.0).abs() < 1e-12);
    }
}

#[test]
fn linear_pressure_gives_buoyancy_force() {
    // p = a y. The probes sit on a circle of radius R + delta, so the
    // closed-surface integral of -p n is -a pi R (R + delta) in y.
    let (grid, reg, tags) = setup();
    let a = 2.0;
    let field = FieldBuffers::from_fn(&grid, |_, _| 0.0, |_, _| 0.0, |_, y| a * y);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    let integrator = ForceIntegrator { probe_factor: PROBE, nu: 0.01 };
    let report = integrator.compute(&sampler).unwrap();

    let delta = PROBE / N as f64;
    let expected = -a * PI * R * (R + delta);
    let f = report.bodies[0];
    eprintln!("Fy = {:.6}, expected {:.6}", f.net_force[1], expected);
    assert!(f.net_force[0].abs() < 1e-10);
    assert!(((f.net_force[1] - expected) / expected).abs() < 1e-3);
}

#[test]
fn uniform_slip_gives_viscous_drag() {
    let (grid, reg, tags) = setup();
    let (u0, nu) = (1.0, 0.02);
    let field = FieldBuffers::from_fn(&grid, |_, _| u0, |_, _| 0.0, |_, _| 0.0);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    let integrator = ForceIntegrator { probe_factor: PROBE, nu };
    let report = integrator.compute(&sampler).unwrap();

    let delta = PROBE / N as f64;
    let expected = nu * u0 / delta * perimeter(&reg);
    let f = report.bodies[0];
    assert!((f.viscous_force[0] - expected).abs() < 1e-10 * expected.abs().max(1.0));
    assert!(f.viscous_force[1].abs() < 1e-12);
    assert_eq!(f.pressure_force, [0.0, 0.0]);
}

#[test]
fn co_moving_wall_feels_no_viscous_force() {
    let (grid, mut reg, tags) = setup();
    for k in 0..reg.total_points() {
        reg.markers.ub[k] = 0.4;
    }
    let field = FieldBuffers::from_fn(&grid, |_, _| 0.4, |_, _| 0.0, |_, _| 0.0);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    let report = ForceIntegrator { probe_factor: PROBE, nu: 0.05 }.compute(&sampler).unwrap();
    assert!(report.bodies[0].viscous_force[0].abs() < 1e-10);
}
