//! Structural checks on image-point stencils, and loud failure when a
//! stencil cannot be formed.

use std::f64::consts::PI;

use kernel::stencil::CornerKind;
use kernel::{
    BodyRegistry, FieldBuffers, IbError, MarkerLocator, NodeFamily, NodeRole, NodeTagger, Sampler, StaggeredGrid,
    StencilBuilder, TagSet,
};

fn circle(cx: f64, cy: f64, r: f64, n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|k| {
            let th = 2.0 * PI * k as f64 / n as f64;
            (cx + r * th.cos(), cy + r * th.sin())
        })
        .collect()
}

fn tagged(points: &[(f64, f64)], n: usize) -> (StaggeredGrid, BodyRegistry, TagSet) {
    let grid = StaggeredGrid::uniform(n, n, 0.0, 1.0, 0.0, 1.0).unwrap();
    let mut reg = BodyRegistry::new();
    reg.add_body(points).unwrap();
    MarkerLocator::new(2.0, 1).update(&grid, &mut reg).unwrap();
    let mut tags = TagSet::new(&grid);
    NodeTagger::default().tag(&grid, &reg, &mut tags).unwrap();
    (grid, reg, tags)
}

#[test]
fn stencils_only_use_fluid_side_nodes() {
    let (grid, reg, tags) = tagged(&circle(0.5, 0.5, 0.23, 180), 64);
    let field = FieldBuffers::from_fn(&grid, |x, y| x + y, |x, y| x - y, |x, _| x);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    let records = StencilBuilder::default().build_all(&sampler).unwrap();

    for (family, recs) in NodeFamily::ALL.into_iter().zip(records.iter()) {
        let ft = tags.family(family);
        assert_eq!(recs.len(), tags.boundary_nodes(family).len());
        for r in recs {
            assert!(matches!(r.role, NodeRole::Hybrid | NodeRole::Ghost));
            let mut node_weight = 0.0;
            for (c, w) in r.corners.iter().zip(r.weights) {
                match c.kind {
                    CornerKind::Node(idx) => {
                        assert_ne!(idx, r.index, "{} node {} uses itself", family, r.index);
                        assert!(
                            matches!(ft.role(idx), NodeRole::Fluid | NodeRole::Hybrid),
                            "{} node {} uses a {:?} corner",
                            family,
                            r.index,
                            ft.role(idx)
                        );
                        node_weight += w;
                    }
                    CornerKind::Boundary { t, .. } => assert!((0.0..=1.0).contains(&t)),
                }
            }

            let reach = (r.image.0 - r.intercept.0).hypot(r.image.1 - r.intercept.1);
            assert!((reach - r.probe_length).abs() < 1e-12);
            match r.role {
                NodeRole::Ghost => assert!((-1.0..=0.0).contains(&r.alpha)),
                _ => assert!((0.0..=0.5 + 1e-12).contains(&r.alpha)),
            }

            match family {
                NodeFamily::U | NodeFamily::V => {
                    let total: f64 = r.weights.iter().sum();
                    assert!((total - 1.0).abs() < 1e-9);
                }
                NodeFamily::P => {
                    // Neumann corners carry no constant part.
                    assert!((node_weight - 1.0).abs() < 1e-9);
                    assert!(r.pressure.is_some());
                }
            }
        }
    }
}

#[test]
fn moving_wall_velocity_is_imposed() {
    let (grid, mut reg, tags) = tagged(&circle(0.5, 0.5, 0.2, 128), 50);
    for k in 0..reg.total_points() {
        reg.markers.ub[k] = 0.7;
        reg.markers.vb[k] = -0.3;
    }
    // Uniform flow equal to the wall velocity: every reconstruction agrees.
    let field = FieldBuffers::from_fn(&grid, |_, _| 0.7, |_, _| -0.3, |_, _| 0.0);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.0));
    let records = StencilBuilder::default().build_all(&sampler).unwrap();
    for r in &records[0] {
        assert!((r.boundary_value - 0.7).abs() < 1e-12);
        assert!((r.node_value - 0.7).abs() < 1e-9);
    }
    for r in &records[1] {
        assert!((r.node_value + 0.3).abs() < 1e-9);
    }
}

#[test]
fn collapsed_stencil_is_an_error() {
    // L-shaped body with a reflex corner at (0.5, 0.5). Interior points
    // below-left of that corner all project onto it.
    let l_shape = [(0.2, 0.2), (0.8, 0.2), (0.8, 0.5), (0.5, 0.5), (0.5, 0.8), (0.2, 0.8)];
    let (grid, reg, tags) = tagged(&l_shape, 20);
    let field = FieldBuffers::zeros(&grid);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));

    let err = sampler.value_at(NodeFamily::P, 0.4, 0.4, &[2, 3], 0).unwrap_err();
    assert!(matches!(err, IbError::DegenerateStencil { family: NodeFamily::P, .. }), "{}", err);
}

#[test]
fn point_outside_lattice_is_an_error() {
    let (grid, reg, tags) = tagged(&circle(0.5, 0.5, 0.2, 64), 20);
    let field = FieldBuffers::zeros(&grid);
    let sampler = Sampler::new(&grid, &reg, &tags, field.view(0.01));
    // The u lattice starts at the first interior face.
    assert!(sampler.value_at(NodeFamily::U, 0.01, 0.5, &[0, 1, 2], 0).is_err());
}
