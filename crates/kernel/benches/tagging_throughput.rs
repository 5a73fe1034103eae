//! Locate + tag + stencil throughput for a translating cylinder.
//!
//! Run with: cargo bench -p ibm-kernel --bench tagging_throughput

use std::f64::consts::PI;
use std::time::Instant;

use kernel::{
    BodyRegistry, FieldBuffers, MarkerLocator, NodeTagger, Sampler, StaggeredGrid, StencilBuilder, TagSet,
};

fn cylinder(n_markers: usize) -> Vec<(f64, f64)> {
    (0..n_markers)
        .map(|k| {
            let th = 2.0 * PI * k as f64 / n_markers as f64;
            (0.4 + 0.15 * th.cos(), 0.5 + 0.15 * th.sin())
        })
        .collect()
}

fn main() {
    println!("=== Immersed-boundary pass throughput ===\n");

    // (cells per side, steps)
    let configs = [(128, 40), (256, 20), (512, 10), (1024, 5)];

    println!("{:>8} {:>8} {:>10} {:>12} {:>12} {:>12}",
        "Cells", "Markers", "Shell", "locate ms", "tag ms", "stencil ms");

    for &(n, steps) in &configs {
        let grid = StaggeredGrid::uniform(n, n, 0.0, 1.0, 0.0, 1.0).expect("grid");
        let h = 1.0 / n as f64;
        let markers = (2.0 * PI * 0.15 / h).ceil() as usize * 2;
        let mut reg = BodyRegistry::new();
        reg.add_body(&cylinder(markers)).expect("body");
        let mut locator = MarkerLocator::new(2.0, 1);
        let mut tags = TagSet::new(&grid);
        let field = FieldBuffers::from_fn(&grid, |_, y| y, |x, _| -x, |x, y| x * y);

        let (mut t_locate, mut t_tag, mut t_stencil) = (0.0, 0.0, 0.0);
        let mut shell = 0;
        for _ in 0..steps {
            for x in reg.markers.x.iter_mut() {
                *x += 0.25 * h;
            }

            let start = Instant::now();
            locator.update(&grid, &mut reg).expect("locate");
            t_locate += start.elapsed().as_secs_f64();

            let start = Instant::now();
            NodeTagger::default().tag(&grid, &reg, &mut tags).expect("tag");
            t_tag += start.elapsed().as_secs_f64();

            let start = Instant::now();
            let sampler = Sampler::new(&grid, &reg, &tags, field.view(1e-3));
            let records = StencilBuilder::default().build_all(&sampler).expect("stencils");
            t_stencil += start.elapsed().as_secs_f64();
            shell = records.iter().map(Vec::len).sum();
        }

        let per = |t: f64| t * 1000.0 / steps as f64;
        println!("{:>8} {:>8} {:>10} {:>12.3} {:>12.3} {:>12.3}",
            n, markers, shell, per(t_locate), per(t_tag), per(t_stencil));
    }
}
