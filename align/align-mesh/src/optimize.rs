//! Parallel relaxation of coupled spring meshes.

use align_types::{pairwise_mean, CancelToken, ErrorHistory, OptimizeStatus};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{MeshError, MeshResult, MeshStep, SpringMesh};

/// Outcome of a relaxation run.
#[derive(Debug, Clone, Copy)]
pub struct RelaxReport {
    /// Iterations executed.
    pub iterations: usize,
    /// How the run terminated.
    pub status: OptimizeStatus,
    /// Mean energy at the final iteration.
    pub energy: f64,
    /// Largest vertex displacement at the final iteration.
    pub max_displacement: f64,
}

fn step_all(meshes: &mut [SpringMesh], iteration: usize) -> MeshResult<(f64, f64)> {
    // Snapshot every mesh's passive positions so cross-mesh springs read a
    // consistent frame while the meshes update in parallel.
    let frames: Vec<Vec<_>> = meshes.iter().map(SpringMesh::passive_worlds).collect();
    let steps: Vec<MeshResult<MeshStep>> = meshes
        .par_iter_mut()
        .map(|m| m.update(&frames))
        .collect();

    let mut max_displacement = 0.0_f64;
    let mut energies = Vec::with_capacity(steps.len());
    for step in steps {
        let step = step?;
        max_displacement = max_displacement.max(step.max_displacement);
        energies.push(step.energy);
    }
    let energy = pairwise_mean(&energies);
    if !energy.is_finite() {
        return Err(MeshError::Diverged { iteration });
    }
    Ok((max_displacement, energy))
}

/// Relax a set of coupled meshes until the largest vertex displacement
/// drops below `max_epsilon` or the mean energy plateaus over a window of
/// `max_plateau_width` iterations, capped at `max_iterations`.
///
/// # Errors
///
/// [`MeshError::Collapse`] when a lattice triangle degenerates and
/// [`MeshError::Diverged`] when the energy becomes non-finite.
pub fn optimize_meshes(
    meshes: &mut [SpringMesh],
    max_epsilon: f64,
    max_iterations: usize,
    max_plateau_width: usize,
    cancel: Option<&CancelToken>,
) -> MeshResult<RelaxReport> {
    info!(
        meshes = meshes.len(),
        max_epsilon, max_iterations, max_plateau_width, "relaxing spring meshes"
    );
    let mut history = ErrorHistory::new(max_plateau_width);
    let mut report = RelaxReport {
        iterations: 0,
        status: OptimizeStatus::IterationLimit,
        energy: 0.0,
        max_displacement: 0.0,
    };

    for iteration in 0..max_iterations {
        if cancel.is_some_and(CancelToken::is_canceled) {
            report.status = OptimizeStatus::Canceled;
            break;
        }
        let (max_displacement, energy) = step_all(meshes, iteration)?;
        report.iterations = iteration + 1;
        report.energy = energy;
        report.max_displacement = max_displacement;
        history.push(energy);

        if max_displacement < max_epsilon {
            report.status = OptimizeStatus::Converged;
            break;
        }
        if history.plateaued() {
            report.status = OptimizeStatus::Plateaued;
            break;
        }
        if iteration % 100 == 0 {
            debug!(iteration, energy, max_displacement, "relaxation step");
        }
    }

    info!(
        iterations = report.iterations,
        status = ?report.status,
        energy = report.energy,
        "spring mesh relaxation finished"
    );
    Ok(report)
}

/// The historical relaxation loop: a fixed iteration count with early exit
/// only on the displacement threshold. Kept selectable for bit-compatible
/// reruns of old solves.
///
/// # Errors
///
/// Same failure modes as [`optimize_meshes`].
pub fn optimize_meshes_legacy(
    meshes: &mut [SpringMesh],
    max_epsilon: f64,
    max_iterations: usize,
    cancel: Option<&CancelToken>,
) -> MeshResult<RelaxReport> {
    info!(
        meshes = meshes.len(),
        max_epsilon, max_iterations, "relaxing spring meshes (legacy loop)"
    );
    let mut report = RelaxReport {
        iterations: 0,
        status: OptimizeStatus::IterationLimit,
        energy: 0.0,
        max_displacement: 0.0,
    };
    for iteration in 0..max_iterations {
        if cancel.is_some_and(CancelToken::is_canceled) {
            report.status = OptimizeStatus::Canceled;
            break;
        }
        let (max_displacement, energy) = step_all(meshes, iteration)?;
        report.iterations = iteration + 1;
        report.energy = energy;
        report.max_displacement = max_displacement;
        if max_displacement < max_epsilon {
            report.status = OptimizeStatus::Converged;
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MeshParams, PassiveOwner, PassiveRef, Spring};
    use align_types::Point;
    use nalgebra::{Point2, Vector2};

    fn two_coupled_meshes(offset: Vector2<f64>) -> Vec<SpringMesh> {
        let params = MeshParams {
            resolution: 5,
            ..MeshParams::sized(20.0, 20.0)
        };
        let mut a = SpringMesh::new(0, &params).unwrap();
        let mut b = SpringMesh::new(1, &params).unwrap();

        // Constrain a handful of lattice vertices of mesh 0 to positions
        // shifted by `offset`, carried by mesh 1.
        for v in [0, 2, 4, 12, 24] {
            let local = a.vertices()[v].local();
            let target = Point::with_world(local, Point2::from(local.coords + offset));
            let passive = b.add_passive_vertex(target, PassiveOwner { mesh: 0, vertex: v });
            a.add_attachment(
                v,
                PassiveRef { mesh: 1, index: passive },
                Spring::new(0.0, 1.0),
                1.0,
            );
        }
        vec![a, b]
    }

    #[test]
    fn relaxation_moves_constrained_mesh_toward_targets() {
        let mut meshes = two_coupled_meshes(Vector2::new(2.0, 0.0));
        let report =
            optimize_meshes(&mut meshes, 1e-4, 5000, 200, None).unwrap();
        assert!(report.status.is_converged(), "status {:?}", report.status);

        // The constrained vertex moved toward its target.
        let moved = meshes[0].vertices()[0].world().x;
        assert!(moved > 0.5, "vertex only moved to x = {moved}");
    }

    #[test]
    fn relaxation_without_constraints_converges_immediately() {
        let params = MeshParams::sized(10.0, 10.0);
        let mut meshes = vec![SpringMesh::new(0, &params).unwrap()];
        let report = optimize_meshes(&mut meshes, 1e-9, 100, 10, None).unwrap();
        assert_eq!(report.iterations, 1);
        assert!(matches!(report.status, OptimizeStatus::Converged));
    }

    #[test]
    fn legacy_loop_respects_iteration_cap() {
        let mut meshes = two_coupled_meshes(Vector2::new(5.0, 0.0));
        let report = optimize_meshes_legacy(&mut meshes, 1e-12, 3, None).unwrap();
        assert_eq!(report.iterations, 3);
        assert!(matches!(report.status, OptimizeStatus::IterationLimit));
    }

    #[test]
    fn cancel_stops_before_first_iteration() {
        let mut meshes = two_coupled_meshes(Vector2::new(1.0, 0.0));
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = optimize_meshes(&mut meshes, 1e-4, 100, 10, Some(&cancel)).unwrap();
        assert_eq!(report.iterations, 0);
        assert!(matches!(report.status, OptimizeStatus::Canceled));
    }

    #[test]
    fn energy_decreases_in_expectation() {
        let mut meshes = two_coupled_meshes(Vector2::new(3.0, 1.0));
        let mut energies = Vec::new();
        for i in 0..50 {
            let (_, e) = step_all(&mut meshes, i).unwrap();
            energies.push(e);
        }
        // Monotone within numerical noise: compare the first and last
        // window means.
        let head: f64 = energies[..10].iter().sum::<f64>() / 10.0;
        let tail: f64 = energies[40..].iter().sum::<f64>() / 10.0;
        assert!(tail <= head + 1e-9, "energy grew from {head} to {tail}");
    }
}
