//! Run reporting.

use align_mesh::RelaxReport;
use align_solver::SolveReport;

/// Summary of one elastic alignment run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Matches whose `p1` missed the lattice and were dropped during
    /// fix-up.
    pub dropped_matches: usize,
    /// Outcome of the rigid pre-alignment stage.
    pub prealign: Option<SolveReport>,
    /// Outcome of the spring-mesh relaxation stage.
    pub relaxation: RelaxReport,
    /// Layers with emitted output.
    pub layers_emitted: usize,
}
