//! Bodies whose edges coincide with grid lines.
//!
//! Nodes lying exactly on the boundary must be classified as inside, the
//! same way along the whole edge.

use kernel::{BodyRegistry, MarkerLocator, NodeFamily, NodeRole, NodeTagger, StaggeredGrid, TagSet};

#[test]
fn nodes_on_an_edge_are_inside() {
    let grid = StaggeredGrid::uniform(20, 20, 0.0, 1.0, 0.0, 1.0).unwrap();
    let xs = grid.xs(NodeFamily::P).to_vec();
    let ys = grid.ys(NodeFamily::P).to_vec();
    // Square whose edges run through pressure nodes 6 and 13.
    let (x0, x1, y0, y1) = (xs[6], xs[13], ys[6], ys[13]);

    let mut reg = BodyRegistry::new();
    reg.add_body(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)]).unwrap();
    MarkerLocator::new(1.5, 1).update(&grid, &mut reg).unwrap();
    let mut tags = TagSet::new(&grid);
    NodeTagger::default().tag(&grid, &reg, &mut tags).unwrap();
    tags.verify_partition().unwrap();

    let role = |i: usize, j: usize| tags.p.role(grid.index(NodeFamily::P, i, j));
    for j in 6..=13 {
        assert_eq!(role(6, j), NodeRole::Ghost, "left edge node (6, {})", j);
        assert_eq!(role(13, j), NodeRole::Ghost, "right edge node (13, {})", j);
        assert_eq!(role(5, j), NodeRole::Hybrid);
        assert_eq!(role(14, j), NodeRole::Hybrid);
    }
    for i in 6..=13 {
        assert_eq!(role(i, 6), NodeRole::Ghost, "bottom edge node ({}, 6)", i);
        assert_eq!(role(i, 13), NodeRole::Ghost, "top edge node ({}, 13)", i);
    }
    assert_eq!(role(7, 7), NodeRole::Solid);
    // Diagonal neighbours of a corner are not axis neighbours.
    assert_eq!(role(5, 5), NodeRole::Fluid);
}

#[test]
fn clockwise_markers_tag_the_same_nodes() {
    let grid = StaggeredGrid::uniform(20, 20, 0.0, 1.0, 0.0, 1.0).unwrap();
    let xs = grid.xs(NodeFamily::P).to_vec();
    let ys = grid.ys(NodeFamily::P).to_vec();
    let ccw = [(xs[6], ys[6]), (xs[13], ys[6]), (xs[13], ys[13]), (xs[6], ys[13])];
    let mut cw = ccw;
    cw.reverse();

    let mut tagged = Vec::new();
    for points in [ccw, cw] {
        let mut reg = BodyRegistry::new();
        reg.add_body(&points).unwrap();
        MarkerLocator::new(1.5, 1).update(&grid, &mut reg).unwrap();
        let mut tags = TagSet::new(&grid);
        NodeTagger::default().tag(&grid, &reg, &mut tags).unwrap();
        let roles: Vec<NodeRole> = (0..tags.p.len()).map(|idx| tags.p.role(idx)).collect();
        tagged.push(roles);
    }
    assert_eq!(tagged[0], tagged[1]);
}
