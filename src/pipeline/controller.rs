//! The flow state machine.

use crate::algo::deviation::{self, Deviation};
use crate::algo::ellipsoid::EllipsoidFit;
use crate::algo::flow;
use crate::algo::normalize::normalize;
use crate::algo::operators::{CotanLaplacian, MassMatrix};
use crate::backend::GeometryBackend;
use crate::error::{OvoidError, Result};
use crate::mesh::{EdgeTopology, TriMesh};
use crate::pipeline::{ArtifactSink, DeviationSource, FlowConfig, Stage, VolumeSource};

/// State of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// More iterations are needed.
    Running,
    /// The deviation statistic fell below the threshold.
    Converged,
    /// The iteration budget ran out before convergence.
    MaxIterExceeded,
    /// A numerical stage failed.
    SolverFailed,
    /// Output failed, or a stage failed for a non-numerical reason.
    Aborted,
}

impl FlowState {
    /// Whether no further step is possible.
    pub fn is_terminal(self) -> bool {
        self != FlowState::Running
    }
}

/// Everything one iteration produced.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub index: usize,
    /// Flowed and normalized mesh; the next iteration's input.
    pub flowed: TriMesh,
    /// Smoothed copy of `flowed`.
    pub smoothed: TriMesh,
    /// `smoothed` after vertex merging.
    pub cleaned: TriMesh,
    /// Tessellated fitted ellipsoid.
    pub ellipsoid: TriMesh,
    /// The fit itself.
    pub fit: EllipsoidFit,
    /// Distances from `ellipsoid` of the vertices picked by
    /// [`DeviationSource`].
    pub deviation: Deviation,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    /// [`FlowState::Converged`] or [`FlowState::MaxIterExceeded`].
    pub state: FlowState,
    /// Number of completed iterations.
    pub iterations: usize,
    /// Deviation statistic of the last iteration.
    pub statistic: f64,
    /// Ellipsoid fitted in the last iteration.
    pub fit: EllipsoidFit,
}

/// Drives the flow loop one iteration at a time.
///
/// The cotangent Laplacian is assembled once, from the mesh passed to
/// [`FlowController::new`]. Every [`step`](Self::step) uses the mass matrix
/// of the current mesh.
pub struct FlowController<B: GeometryBackend, S: ArtifactSink> {
    config: FlowConfig,
    backend: B,
    sink: S,
    laplacian: CotanLaplacian,
    current: TriMesh,
    iteration: usize,
    state: FlowState,
    last: Option<(Deviation, EllipsoidFit)>,
    sink_finished: bool,
}

impl<B: GeometryBackend, S: ArtifactSink> FlowController<B, S> {
    /// Validate `config` and assemble the Laplacian of `mesh`.
    ///
    /// # Errors
    ///
    /// - [`OvoidError::InvalidParameter`] if the configuration is invalid.
    /// - [`OvoidError::IterationFailed`] at [`Stage::Operators`] if the
    ///   Laplacian cannot be built (empty mesh, zero area faces).
    pub fn new(mesh: TriMesh, config: FlowConfig, backend: B, sink: S) -> Result<Self> {
        config.validate()?;

        let topology = EdgeTopology::new(&mesh);
        if !topology.is_closed_manifold() {
            log::warn!(
                "input mesh is not closed and manifold ({} boundary, {} non-manifold edges); \
                 enclosed volume is not meaningful",
                topology.boundary_edges().count(),
                topology.non_manifold_edges().count()
            );
        }

        let laplacian =
            CotanLaplacian::new(&mesh).map_err(|e| e.in_stage(0, Stage::Operators))?;
        log::debug!(
            "laplacian: {} vertices, {} non-zeros",
            laplacian.dim(),
            laplacian.nnz()
        );

        Ok(Self {
            config,
            backend,
            sink,
            laplacian,
            current: mesh,
            iteration: 0,
            state: FlowState::Running,
            last: None,
            sink_finished: false,
        })
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The mesh the next step flows: the input mesh, then the latest flowed mesh.
    pub fn current(&self) -> &TriMesh {
        &self.current
    }

    /// Deviation of the last completed iteration.
    pub fn last_deviation(&self) -> Option<&Deviation> {
        self.last.as_ref().map(|(d, _)| d)
    }

    /// Ellipsoid fitted in the last completed iteration.
    pub fn last_fit(&self) -> Option<&EllipsoidFit> {
        self.last.as_ref().map(|(_, f)| f)
    }

    /// The configuration in use.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// The artifact sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the controller, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// The outcome, once the run has converged or exhausted its budget.
    pub fn outcome(&self) -> Option<FlowOutcome> {
        match (self.state, &self.last) {
            (FlowState::Converged | FlowState::MaxIterExceeded, Some((deviation, fit))) => {
                Some(FlowOutcome {
                    state: self.state,
                    iterations: self.iteration,
                    statistic: deviation.statistic,
                    fit: fit.clone(),
                })
            }
            _ => None,
        }
    }

    /// Run one iteration and return the new state.
    ///
    /// On failure the state becomes [`FlowState::SolverFailed`] or
    /// [`FlowState::Aborted`], the sink is finished and the stage error is
    /// returned as [`OvoidError::IterationFailed`].
    ///
    /// # Errors
    ///
    /// [`OvoidError::InvalidState`] if the state is already terminal.
    pub fn step(&mut self) -> Result<FlowState> {
        if self.state.is_terminal() {
            return Err(OvoidError::InvalidState(format!(
                "flow is {:?}; no further steps possible",
                self.state
            )));
        }

        let index = self.iteration;
        let record = match self.iterate(index) {
            Ok(record) => record,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.sink.record(&record) {
            return Err(self.fail(e.in_stage(index, Stage::Sink)));
        }

        let statistic = record.deviation.statistic;
        log::info!("iter {}: {}", index + 1, statistic);

        self.iteration = index + 1;
        self.state = if statistic < self.config.threshold {
            FlowState::Converged
        } else if self.iteration > self.config.max_iterations {
            FlowState::MaxIterExceeded
        } else {
            FlowState::Running
        };
        self.last = Some((record.deviation, record.fit));
        self.current = record.flowed;

        if self.state.is_terminal() {
            if let Err(e) = self.finish_sink() {
                return Err(self.fail(e.in_stage(index, Stage::Sink)));
            }
        }
        Ok(self.state)
    }

    /// Step until a terminal state.
    ///
    /// # Errors
    ///
    /// The first stage failure, or [`OvoidError::InvalidState`] if the run had
    /// already failed before this call.
    pub fn run(&mut self) -> Result<FlowOutcome> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        self.outcome().ok_or_else(|| {
            OvoidError::InvalidState(format!("flow ended in state {:?}", self.state))
        })
    }

    fn iterate(&self, index: usize) -> Result<IterationRecord> {
        let config = &self.config;
        let stage = |stage: Stage| move |e: OvoidError| e.in_stage(index, stage);

        let mass = MassMatrix::barycentric(&self.current).map_err(stage(Stage::Operators))?;
        let stepped = flow::implicit_step(&self.laplacian, &mass, &self.current, config.dt)
            .map_err(stage(Stage::Flow))?;
        let normalized = normalize(&stepped).map_err(stage(Stage::Normalize))?;
        log::debug!(
            "iter {}: flowed area {:.6} before rescaling",
            index + 1,
            normalized.area
        );
        let flowed = normalized.mesh;

        let smoothed = self
            .backend
            .smooth(&flowed, &config.smooth)
            .map_err(stage(Stage::Smooth))?;
        let cleaned = self
            .backend
            .clean(&smoothed, &config.clean)
            .map_err(stage(Stage::Clean))?;
        log::debug!(
            "iter {}: cleaned {} -> {} vertices",
            index + 1,
            smoothed.num_vertices(),
            cleaned.num_vertices()
        );

        let volume = match config.volume_source {
            VolumeSource::Flowed => self.backend.volume(&flowed),
            VolumeSource::Smoothed => self.backend.volume(&smoothed),
        };
        let fit = EllipsoidFit::fit(cleaned.positions(), volume).map_err(stage(Stage::Fit))?;
        let (u_res, v_res) = config.ellipsoid_resolution;
        let ellipsoid = fit.surface(u_res, v_res);
        log::debug!(
            "iter {}: radii {:.6}, {:.6}, {:.6}",
            index + 1,
            fit.radii[0],
            fit.radii[1],
            fit.radii[2]
        );

        let field = self
            .backend
            .distance_field(&ellipsoid)
            .map_err(stage(Stage::Deviation))?;
        let measured = match config.deviation_source {
            DeviationSource::Flowed => flowed.positions(),
            DeviationSource::Smoothed => smoothed.positions(),
        };
        let deviation = deviation::evaluate(
            field.as_ref(),
            measured,
            config.quantile,
            config.parallel,
        )
        .map_err(stage(Stage::Deviation))?;

        Ok(IterationRecord {
            index,
            flowed,
            smoothed,
            cleaned,
            ellipsoid,
            fit,
            deviation,
        })
    }

    /// Move to the failure state matching `error` and finish the sink.
    fn fail(&mut self, error: OvoidError) -> OvoidError {
        self.state = failure_state(&error);
        log::error!("{}", error);
        if let Err(e) = self.finish_sink() {
            log::warn!("sink: finish after failure: {}", e);
        }
        error
    }

    fn finish_sink(&mut self) -> Result<()> {
        if self.sink_finished {
            return Ok(());
        }
        self.sink_finished = true;
        self.sink.finish()
    }
}

fn failure_state(error: &OvoidError) -> FlowState {
    let (stage, source) = match error {
        OvoidError::IterationFailed { stage, source, .. } => (Some(*stage), source.as_ref()),
        other => (None, other),
    };
    if stage == Some(Stage::Sink) {
        return FlowState::Aborted;
    }
    match source {
        OvoidError::Io(_)
        | OvoidError::LoadError { .. }
        | OvoidError::SaveError { .. }
        | OvoidError::UnsupportedFormat { .. }
        | OvoidError::InvalidState(_)
        | OvoidError::InvalidParameter { .. } => FlowState::Aborted,
        _ => FlowState::SolverFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::clean::CleanOptions;
    use crate::algo::distance::DistanceField;
    use crate::algo::smooth::SmoothOptions;
    use crate::backend::NativeBackend;
    use crate::mesh::primitives::{icosahedron, icosphere, uv_ellipsoid};
    use crate::pipeline::{FileSink, MemorySink};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn unit_area_sphere_radius() -> f64 {
        (1.0 / (4.0 * std::f64::consts::PI)).sqrt()
    }

    #[test]
    fn test_sphere_converges_first_iteration() {
        // Below the edge length, so cleaning keeps every vertex and the fitted
        // point cloud stays symmetric.
        let config = FlowConfig::new(0.001)
            .with_max_iterations(10)
            .with_clean(CleanOptions::default().with_tolerance(0.01));
        let mut controller =
            FlowController::new(icosphere(3, 2.0), config, NativeBackend, MemorySink::new())
                .unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.state, FlowState::Converged);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.statistic < 0.01, "statistic {}", outcome.statistic);

        let r = unit_area_sphere_radius();
        for i in 0..3 {
            assert!(
                (outcome.fit.radii[i] - r).abs() < 0.03 * r,
                "radius {} vs {}",
                outcome.fit.radii[i],
                r
            );
        }

        let sink = controller.into_sink();
        assert!(sink.is_finished());
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_zero_budget_runs_one_iteration_and_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlowConfig::new(0.001)
            .with_max_iterations(0)
            .with_threshold(1e-12);
        let sink = FileSink::new(dir.path()).unwrap();
        let mut controller =
            FlowController::new(icosphere(2, 1.0), config, NativeBackend, sink).unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.state, FlowState::MaxIterExceeded);
        assert_eq!(outcome.iterations, 1);
        drop(controller);

        for name in ["temp_0000.off", "temp_0000.vtk", "cleaned_0000.vtk", "ell_0000.vtk"] {
            assert!(dir.path().join(name).is_file(), "missing {}", name);
        }
        assert!(!dir.path().join("temp_0001.off").exists());
        let radii = std::fs::read_to_string(dir.path().join("radii.txt")).unwrap();
        assert_eq!(radii.lines().count(), 1);
    }

    #[test]
    fn test_icosphere_converges_with_round_fit() {
        let config = FlowConfig::new(0.001)
            .with_pass_band(0.1)
            .with_max_iterations(50);
        let mut controller =
            FlowController::new(icosphere(2, 1.0), config, NativeBackend, MemorySink::new())
                .unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.state, FlowState::Converged);
        let radii = outcome.fit.radii;
        assert!(radii[0] / radii[2] < 1.05, "radii {:?}", radii);
    }

    #[test]
    fn test_raw_icosahedron_plateaus_above_threshold() {
        // Unit-area vertices sit at circumradius 0.3232 while the volume
        // matched sphere has radius 0.2734, and the regular shape is a fixed
        // point of the flow.
        let config = FlowConfig::new(0.001)
            .with_pass_band(0.1)
            .with_max_iterations(50);
        let mut controller =
            FlowController::new(icosahedron(1.0), config, NativeBackend, MemorySink::new())
                .unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.state, FlowState::MaxIterExceeded);
        assert_eq!(outcome.iterations, 51);
        assert!(
            outcome.statistic > 0.045 && outcome.statistic < 0.06,
            "statistic {}",
            outcome.statistic
        );
        for r in outcome.fit.radii.iter() {
            assert_relative_eq!(*r, 0.2734, epsilon = 1e-3);
        }

        let first = controller.sink().records()[0].deviation.statistic;
        assert_relative_eq!(first, outcome.statistic, epsilon = 5e-3);

        let config = FlowConfig::new(0.001)
            .with_pass_band(0.1)
            .with_threshold(0.06);
        let mut controller =
            FlowController::new(icosahedron(1.0), config, NativeBackend, MemorySink::new())
                .unwrap();
        let outcome = controller.run().unwrap();
        assert_eq!(outcome.state, FlowState::Converged);
        assert_eq!(outcome.iterations, 1);
    }

    fn noisy_sphere() -> TriMesh {
        let sphere = icosphere(3, 1.0);
        let positions = sphere
            .positions()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let offset = ((i * 7) % 5) as f64 - 2.0;
                Point3::from(p.coords * (1.0 + 0.015 * offset))
            })
            .collect();
        sphere.with_positions(positions).unwrap()
    }

    #[test]
    fn test_deviation_source_selects_measured_mesh() {
        let statistic_for = |source: DeviationSource| {
            let config = FlowConfig::new(0.001)
                .with_max_iterations(0)
                .with_threshold(1e-12)
                .with_clean(CleanOptions::default().with_tolerance(0.01))
                .with_deviation_source(source)
                .sequential();
            let mut controller =
                FlowController::new(noisy_sphere(), config, NativeBackend, MemorySink::new())
                    .unwrap();
            controller.run().unwrap();
            let record = controller.into_sink().into_records().remove(0);
            (record.deviation.statistic, record.fit.radii)
        };

        let (flowed, flowed_radii) = statistic_for(DeviationSource::Flowed);
        let (smoothed, smoothed_radii) = statistic_for(DeviationSource::Smoothed);

        // Same fit, different point sets.
        assert_relative_eq!(flowed_radii, smoothed_radii, epsilon = 1e-12);
        assert!(
            smoothed < flowed && flowed - smoothed > 1e-4,
            "flowed {} smoothed {}",
            flowed,
            smoothed
        );
    }

    #[test]
    fn test_flowed_meshes_are_normalized_and_chained() {
        let input = uv_ellipsoid(&Vector3::new(1.5, 1.0, 0.7), 24, 16);
        let config = FlowConfig::new(0.01)
            .with_max_iterations(2)
            .with_threshold(1e-12)
            .sequential();
        let mut controller =
            FlowController::new(input.clone(), config, NativeBackend, MemorySink::new()).unwrap();

        assert_eq!(controller.step().unwrap(), FlowState::Running);
        assert_eq!(controller.step().unwrap(), FlowState::Running);
        assert_eq!(controller.step().unwrap(), FlowState::MaxIterExceeded);

        let records = controller.sink().records();
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.index, i);
            assert!(record.flowed.shares_topology(&input));
            assert_relative_eq!(record.flowed.surface_area(), 1.0, epsilon = 1e-9);
            assert!(record.smoothed.shares_topology(&record.flowed));
            assert!(record.cleaned.num_vertices() <= record.flowed.num_vertices());
        }
        assert_eq!(controller.current(), &records[2].flowed);
    }

    #[test]
    fn test_step_after_terminal_state_is_rejected() {
        let config = FlowConfig::new(0.001);
        let mut controller =
            FlowController::new(icosphere(2, 1.0), config, NativeBackend, MemorySink::new())
                .unwrap();
        assert_eq!(controller.step().unwrap(), FlowState::Converged);
        assert!(matches!(controller.step(), Err(OvoidError::InvalidState(_))));
        assert!(controller.run().is_ok());
    }

    struct BrokenDistance;

    impl GeometryBackend for BrokenDistance {
        fn smooth(&self, mesh: &TriMesh, options: &SmoothOptions) -> Result<TriMesh> {
            NativeBackend.smooth(mesh, options)
        }

        fn clean(&self, mesh: &TriMesh, options: &CleanOptions) -> Result<TriMesh> {
            NativeBackend.clean(mesh, options)
        }

        fn volume(&self, mesh: &TriMesh) -> f64 {
            mesh.volume()
        }

        fn distance_field(&self, _surface: &TriMesh) -> Result<Box<dyn DistanceField>> {
            Err(OvoidError::NonFiniteSolution {
                context: "test distance field",
            })
        }
    }

    #[test]
    fn test_numerical_failure_names_stage() {
        let config = FlowConfig::new(0.001);
        let mut controller =
            FlowController::new(icosphere(1, 1.0), config, BrokenDistance, MemorySink::new())
                .unwrap();

        let err = controller.step().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Deviation));
        assert_eq!(controller.state(), FlowState::SolverFailed);
        assert!(controller.outcome().is_none());
        assert!(controller.sink().is_finished());
        assert!(controller.sink().records().is_empty());
        assert!(matches!(controller.run(), Err(OvoidError::InvalidState(_))));
    }

    struct FailingSink;

    impl ArtifactSink for FailingSink {
        fn record(&mut self, _record: &IterationRecord) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    #[test]
    fn test_sink_failure_aborts() {
        let config = FlowConfig::new(0.001);
        let mut controller =
            FlowController::new(icosphere(1, 1.0), config, NativeBackend, FailingSink).unwrap();

        let err = controller.run().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Sink));
        assert_eq!(controller.state(), FlowState::Aborted);
        assert_eq!(controller.iteration(), 0);
    }

    #[test]
    fn test_construction_errors() {
        let bad_config = FlowConfig::new(-1.0);
        assert!(matches!(
            FlowController::new(icosphere(1, 1.0), bad_config, NativeBackend, MemorySink::new()),
            Err(OvoidError::InvalidParameter { name: "dt", .. })
        ));

        let flat = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let err = FlowController::new(flat, FlowConfig::default(), NativeBackend, MemorySink::new())
            .err()
            .unwrap();
        assert_eq!(err.stage(), Some(Stage::Operators));
    }
}
