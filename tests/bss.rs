//! Bike-share matrix scenarios.
//!
//! Walking runs at 5.1 km/h (~1.417 m/s) and riding at 16 km/h
//! (~4.444 m/s); expected times below are derived from those constants
//! with a 60 s station service time per pickup or return.

use tilematrix::costing::{Mode, ModeCosting};
use tilematrix::graph::{BuiltGraph, GraphBuilder, GraphId, WayAttrs};
use tilematrix::location::{Location, PathEdge};
use tilematrix::matrix::{TimeDistanceBssMatrix, TimeDistanceMatrix, ALL_LOCATIONS};

const MAX_DISTANCE: f32 = 20_000.0;

fn way(length: f32) -> WayAttrs {
    WayAttrs {
        length: Some(length),
        speed: 50,
        ..Default::default()
    }
}

fn loc(edge: GraphId, percent_along: f32) -> Location {
    Location::from_edges(vec![PathEdge::new(edge, percent_along, 0.0)])
}

/// Both directed edges of the way between `a` and `b`, snapped at
/// `percent_along` of the a->b direction.
fn loc_both(g: &BuiltGraph, a: usize, b: usize, percent_along: f32) -> Location {
    Location::from_edges(vec![
        PathEdge::new(g.edge(a, b), percent_along, 0.0),
        PathEdge::new(g.edge(b, a), 1.0 - percent_along, 0.0),
    ])
}

/// a --100m-- b --1000m-- c --100m-- d, with bike-share stations at b and
/// c when `stations` is set.
fn corridor(stations: bool) -> (BuiltGraph, [usize; 4]) {
    let mut b = GraphBuilder::new(0);
    let a = b.add_node(0, (43.70, 7.400));
    let s1 = b.add_node(0, (43.70, 7.401));
    let s2 = b.add_node(0, (43.70, 7.411));
    let d = b.add_node(0, (43.70, 7.412));
    b.add_way(a, s1, way(100.0));
    b.add_way(s1, s2, way(1000.0));
    b.add_way(s2, d, way(100.0));
    if stations {
        b.set_bike_share(s1);
        b.set_bike_share(s2);
    }
    (b.build(), [a, s1, s2, d])
}

fn run_bss(g: &BuiltGraph, sources: &[Location], targets: &[Location]) -> Vec<u32> {
    let mut engine = TimeDistanceBssMatrix::new();
    engine
        .source_to_target(
            sources,
            targets,
            &g.reader,
            &ModeCosting::default(),
            MAX_DISTANCE,
            ALL_LOCATIONS,
        )
        .iter()
        .map(|td| td.secs)
        .collect()
}

fn run_foot(g: &BuiltGraph, sources: &[Location], targets: &[Location]) -> Vec<u32> {
    let mut engine = TimeDistanceMatrix::new();
    engine
        .source_to_target(
            sources,
            targets,
            &g.reader,
            &ModeCosting::default(),
            Mode::Foot,
            MAX_DISTANCE,
            ALL_LOCATIONS,
        )
        .iter()
        .map(|td| td.secs)
        .collect()
}

#[test]
fn test_bike_leg_beats_walking() {
    let (g, [a, s1, s2, d]) = corridor(true);
    let sources = [loc(g.edge(a, s1), 0.0)];
    let targets = [loc(g.edge(s2, d), 0.5)];

    let foot = run_foot(&g, &sources, &targets);
    let bss = run_bss(&g, &sources, &targets);

    // Walk 100 m, rent, ride 1000 m, return, walk 50 m:
    // 70.6 + 60 + 225 + 60 + 35.3 = ~451 s, against ~812 s on foot.
    assert!((bss[0] as i64 - 451).abs() <= 2, "bss {} s", bss[0]);
    assert!((foot[0] as i64 - 812).abs() <= 2, "foot {} s", foot[0]);
    assert!(bss[0] < foot[0]);
}

#[test]
fn test_no_stations_degrades_to_walking() {
    let (g, [a, s1, s2, d]) = corridor(false);
    let sources = [loc(g.edge(a, s1), 0.0)];
    let targets = [loc(g.edge(s2, d), 0.5)];

    assert_eq!(run_bss(&g, &sources, &targets), run_foot(&g, &sources, &targets));
}

#[test]
fn test_edge_carries_one_label_per_mode() {
    // With a station at each end of the long edge, the search both walks
    // and rides it; the per-mode status spaces must keep those labels
    // apart instead of letting one settlement block the other.
    let (g, [a, s1, s2, d]) = corridor(true);
    let sources = [loc(g.edge(a, s1), 0.0)];
    let targets = [loc(g.edge(s2, d), 0.5)];

    let mut engine = TimeDistanceBssMatrix::new();
    let _ = engine.source_to_target(
        &sources,
        &targets,
        &g.reader,
        &ModeCosting::default(),
        MAX_DISTANCE,
        ALL_LOCATIONS,
    );

    let long_edge = g.edge(s1, s2);
    let modes: Vec<Mode> = engine
        .labels()
        .iter()
        .filter(|l| l.edgeid == long_edge)
        .map(|l| l.mode)
        .collect();
    assert!(modes.contains(&Mode::Foot), "no foot label on {:?}", long_edge);
    assert!(modes.contains(&Mode::Bike), "no bike label on {:?}", long_edge);
}

#[test]
fn test_destination_requires_docking() {
    // Station at b only: the bike cannot be returned before the target,
    // so the engine must fall back to walking the whole corridor rather
    // than settling the target from a bike label.
    let mut b = GraphBuilder::new(0);
    let a = b.add_node(0, (43.70, 7.400));
    let s1 = b.add_node(0, (43.70, 7.401));
    let s2 = b.add_node(0, (43.70, 7.411));
    let d = b.add_node(0, (43.70, 7.412));
    b.add_way(a, s1, way(100.0));
    b.add_way(s1, s2, way(1000.0));
    b.add_way(s2, d, way(100.0));
    b.set_bike_share(s1);
    let g = b.build();

    let sources = [loc(g.edge(a, s1), 0.0)];
    let targets = [loc(g.edge(s2, d), 0.5)];

    let bss = run_bss(&g, &sources, &targets);
    let foot = run_foot(&g, &sources, &targets);
    assert_eq!(bss, foot);
}

#[test]
fn test_bss_transpose_consistency() {
    // 2 sources x 1 target runs the reverse direction; swapping the lists
    // runs forward. With both directions correlated and a symmetric
    // station layout, the two matrices must be transposes of each other.
    let (g, [a, s1, s2, d]) = corridor(true);
    let sources = [loc_both(&g, a, s1, 0.5), loc_both(&g, s1, s2, 0.5)];
    let targets = [loc_both(&g, s2, d, 0.5)];

    let reverse = run_bss(&g, &sources, &targets);
    let forward = run_bss(&g, &targets, &sources);

    assert_eq!(reverse.len(), 2);
    assert_eq!(forward.len(), 2);
    // Different accumulation order, so allow one second of rounding.
    assert!((reverse[0] as i64 - forward[0] as i64).abs() <= 1);
    assert!((reverse[1] as i64 - forward[1] as i64).abs() <= 1);
}
