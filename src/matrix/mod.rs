//! Many-to-many time/distance matrices
//!
//! One engine instance runs a series of one-to-many label-setting searches
//! and concatenates them into a dense row-major matrix:
//!
//! - `TimeDistanceMatrix`: single travel mode
//! - `TimeDistanceBssMatrix`: foot + bike with mode switches at bike-share
//!   stations
//!
//! The search direction is chosen per query: expanding from the smaller of
//! the two location lists minimizes one-to-many runs. In reverse mode each
//! run's result is written as a matrix column.
//!
//! Engines are single-threaded; `source_to_target_parallel` fans
//! independent engine instances over rows with rayon when the matrix is
//! large.

pub mod bss;
pub mod bucket_queue;
pub mod edge_label;
pub mod edge_status;
pub mod time_distance;

pub use bss::TimeDistanceBssMatrix;
pub use bucket_queue::BucketQueue;
pub use edge_label::{EdgeLabel, INVALID_LABEL, INVALID_RESTRICTION};
pub use edge_status::{EdgeSet, EdgeStatus, EdgeStatusInfo};
pub use time_distance::{MatrixStats, TimeDistanceMatrix, ALL_LOCATIONS};

use rayon::prelude::*;

use crate::costing::{Mode, ModeCosting};
use crate::graph::GraphReader;
use crate::location::{Location, TimeDistance};

/// Many-to-many over per-row engine instances.
///
/// Each row (or column, when the reverse direction is cheaper) is an
/// independent one-to-many run, so rows parallelize trivially. Results are
/// identical to `TimeDistanceMatrix::source_to_target`.
pub fn source_to_target_parallel(
    sources: &[Location],
    targets: &[Location],
    reader: &GraphReader,
    mode_costing: &ModeCosting,
    mode: Mode,
    max_matrix_distance: f32,
    matrix_locations: u32,
) -> Vec<TimeDistance> {
    if sources.len() <= targets.len() {
        let rows: Vec<Vec<TimeDistance>> = sources
            .par_iter()
            .map(|source| {
                let mut engine = TimeDistanceMatrix::new();
                engine.source_to_target(
                    std::slice::from_ref(source),
                    targets,
                    reader,
                    mode_costing,
                    mode,
                    max_matrix_distance,
                    matrix_locations,
                )
            })
            .collect();
        rows.into_iter().flatten().collect()
    } else {
        let cols: Vec<Vec<TimeDistance>> = targets
            .par_iter()
            .map(|target| {
                let mut engine = TimeDistanceMatrix::new();
                engine.source_to_target(
                    sources,
                    std::slice::from_ref(target),
                    reader,
                    mode_costing,
                    mode,
                    max_matrix_distance,
                    matrix_locations,
                )
            })
            .collect();

        let mut matrix = vec![TimeDistance::default(); sources.len() * targets.len()];
        for (j, col) in cols.iter().enumerate() {
            for (i, td) in col.iter().enumerate() {
                matrix[i * targets.len() + j] = *td;
            }
        }
        matrix
    }
}
