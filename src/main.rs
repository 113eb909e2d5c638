//! Tilematrix CLI: build a demo tile set and run matrix queries on it.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use tilematrix::costing::{Mode, ModeCosting};
use tilematrix::graph::{GraphBuilder, GraphReader, WayAttrs};
use tilematrix::location::{Location, TimeDistance};
use tilematrix::matrix::{
    source_to_target_parallel, TimeDistanceBssMatrix, TimeDistanceMatrix, ALL_LOCATIONS,
};
use tilematrix::snap::EdgeIndex;

#[derive(Parser)]
#[command(name = "tilematrix", about = "Tiled time/distance matrix engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a demo grid network and save it as a tile directory
    BuildDemo {
        /// Output tile directory
        #[arg(long)]
        out: PathBuf,
        /// Grid dimension (nodes per side)
        #[arg(long, default_value_t = 8)]
        grid: u32,
    },
    /// Compute a many-to-many matrix over a tile directory
    Matrix {
        /// Tile directory
        #[arg(long)]
        tiles: PathBuf,
        /// Travel mode: car, bike or foot
        #[arg(long, default_value = "car")]
        mode: String,
        /// Source coordinates as "lat,lon;lat,lon;..."
        #[arg(long)]
        sources: String,
        /// Target coordinates as "lat,lon;lat,lon;..."
        #[arg(long)]
        targets: String,
        /// Maximum reachable distance in meters
        #[arg(long, default_value_t = 100_000.0)]
        max_distance: f32,
        /// Settle only the closest K targets
        #[arg(long)]
        locations: Option<u32>,
        /// Use the bike-share (foot+bike) engine
        #[arg(long)]
        bss: bool,
        /// Run one engine per source row
        #[arg(long)]
        parallel: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct MatrixResponse {
    mode: String,
    sources: Vec<(f64, f64)>,
    targets: Vec<(f64, f64)>,
    matrix: Vec<Vec<TimeDistance>>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::BuildDemo { out, grid } => build_demo(&out, grid),
        Command::Matrix {
            tiles,
            mode,
            sources,
            targets,
            max_distance,
            locations,
            bss,
            parallel,
            json,
        } => run_matrix(
            &tiles,
            &mode,
            &sources,
            &targets,
            max_distance,
            locations.unwrap_or(ALL_LOCATIONS),
            bss,
            parallel,
            json,
        ),
    }
}

/// A square grid around Monaco with ~400 m spacing, split into two tiles
/// down the middle, with a bike-share station near the center.
fn build_demo(out: &PathBuf, grid: u32) -> Result<()> {
    let mut builder = GraphBuilder::new(0);
    let (lat0, lon0) = (43.73, 7.41);
    let step = 0.004;

    let mut nodes = Vec::new();
    for row in 0..grid {
        for col in 0..grid {
            let tile = if col < grid / 2 { 0 } else { 1 };
            let n = builder.add_node(
                tile,
                (lat0 + row as f64 * step, lon0 + col as f64 * step),
            );
            nodes.push(n);
        }
    }
    builder.set_bike_share(nodes[(grid / 2 * grid + grid / 2) as usize]);

    let mut ways = 0;
    for row in 0..grid {
        for col in 0..grid {
            let n = nodes[(row * grid + col) as usize];
            // Alternate residential and secondary speeds.
            let speed = if (row + col) % 2 == 0 { 30 } else { 50 };
            let attrs = WayAttrs {
                speed,
                ..Default::default()
            };
            if col + 1 < grid {
                builder.add_way(n, nodes[(row * grid + col + 1) as usize], attrs.clone());
                ways += 1;
            }
            if row + 1 < grid {
                builder.add_way(n, nodes[((row + 1) * grid + col) as usize], attrs);
                ways += 1;
            }
        }
    }

    let built = builder.build();
    built.reader.save_dir(out)?;
    println!(
        "Built demo graph: {} nodes, {} ways, {} tiles -> {:?}",
        nodes.len(),
        ways,
        built.reader.tile_count(),
        out
    );
    Ok(())
}

fn parse_lls(input: &str) -> Result<Vec<(f64, f64)>> {
    input
        .split(';')
        .filter(|s| !s.trim().is_empty())
        .map(|pair| {
            let (lat, lon) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("Expected lat,lon but got '{}'", pair))?;
            Ok((
                lat.trim().parse::<f64>().context("Bad latitude")?,
                lon.trim().parse::<f64>().context("Bad longitude")?,
            ))
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn run_matrix(
    tiles: &PathBuf,
    mode: &str,
    sources: &str,
    targets: &str,
    max_distance: f32,
    matrix_locations: u32,
    bss: bool,
    parallel: bool,
    json: bool,
) -> Result<()> {
    let mode = Mode::from_name(mode).ok_or_else(|| anyhow!("Unknown mode '{}'", mode))?;
    let reader = GraphReader::from_dir(tiles)?;
    let index = EdgeIndex::new(&reader);

    let source_lls = parse_lls(sources)?;
    let target_lls = parse_lls(targets)?;
    if source_lls.is_empty() || target_lls.is_empty() {
        return Err(anyhow!("Need at least one source and one target"));
    }
    let source_locs: Vec<Location> = source_lls
        .iter()
        .map(|&ll| index.correlate(&reader, ll, 2))
        .collect();
    let target_locs: Vec<Location> = target_lls
        .iter()
        .map(|&ll| index.correlate(&reader, ll, 2))
        .collect();

    let costing = ModeCosting::default();
    let result = if bss {
        let mut engine = TimeDistanceBssMatrix::new();
        engine.source_to_target(
            &source_locs,
            &target_locs,
            &reader,
            &costing,
            max_distance,
            matrix_locations,
        )
    } else if parallel {
        source_to_target_parallel(
            &source_locs,
            &target_locs,
            &reader,
            &costing,
            mode,
            max_distance,
            matrix_locations,
        )
    } else {
        let mut engine = TimeDistanceMatrix::new();
        engine.source_to_target(
            &source_locs,
            &target_locs,
            &reader,
            &costing,
            mode,
            max_distance,
            matrix_locations,
        )
    };

    let n_targets = target_lls.len();
    if json {
        let response = MatrixResponse {
            mode: if bss {
                "bss".to_string()
            } else {
                mode.name().to_string()
            },
            sources: source_lls,
            targets: target_lls,
            matrix: result.chunks(n_targets).map(|row| row.to_vec()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        for (i, row) in result.chunks(n_targets).enumerate() {
            for (j, td) in row.iter().enumerate() {
                println!("source {} -> target {}: {} s, {} m", i, j, td.secs, td.meters);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lls() {
        let lls = parse_lls("43.7,7.4; 43.8,7.5").unwrap();
        assert_eq!(lls.len(), 2);
        assert!((lls[1].0 - 43.8).abs() < 1e-9);
        assert!(parse_lls("garbage").is_err());
    }
}
