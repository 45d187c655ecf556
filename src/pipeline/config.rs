//! Flow loop configuration.

use crate::algo::clean::CleanOptions;
use crate::algo::smooth::SmoothOptions;
use crate::error::{OvoidError, Result};

/// Which mesh supplies the volume the fitted ellipsoid is matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeSource {
    /// The flowed, normalized mesh before smoothing.
    #[default]
    Flowed,
    /// The smoothed mesh.
    Smoothed,
}

/// Which mesh's vertices are measured against the fitted ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviationSource {
    /// The flowed, normalized mesh before smoothing.
    #[default]
    Flowed,
    /// The smoothed mesh, before cleaning.
    Smoothed,
}

/// Options for the flow loop.
///
/// # Example
///
/// ```
/// use ovoid::pipeline::FlowConfig;
///
/// let config = FlowConfig::new(0.001)
///     .with_max_iterations(50)
///     .with_threshold(0.02);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Implicit Euler time step.
    pub dt: f64,

    /// Iterations allowed before the run is declared non-convergent. The
    /// check happens after an iteration completes, so `0` still runs one.
    pub max_iterations: usize,

    /// Convergence threshold on the deviation statistic.
    pub threshold: f64,

    /// Quantile of the per-vertex distances used as the statistic.
    pub quantile: f64,

    /// Smoothing applied before fitting.
    pub smooth: SmoothOptions,

    /// Vertex merging applied after smoothing.
    pub clean: CleanOptions,

    /// Longitude and latitude resolution of the tessellated ellipsoid.
    pub ellipsoid_resolution: (usize, usize),

    /// Source of the matching volume.
    pub volume_source: VolumeSource,

    /// Mesh whose vertices feed the deviation statistic.
    pub deviation_source: DeviationSource,

    /// Use parallel distance evaluation.
    pub parallel: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            dt: 0.001,
            max_iterations: 100,
            threshold: 0.04,
            quantile: 0.95,
            smooth: SmoothOptions::default(),
            clean: CleanOptions::default(),
            ellipsoid_resolution: (30, 30),
            volume_source: VolumeSource::Flowed,
            deviation_source: DeviationSource::Flowed,
            parallel: true,
        }
    }
}

impl FlowConfig {
    /// Default configuration with the given time step.
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            ..Self::default()
        }
    }

    /// Set the time step.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the deviation quantile.
    pub fn with_quantile(mut self, quantile: f64) -> Self {
        self.quantile = quantile;
        self
    }

    /// Set the smoothing options.
    pub fn with_smooth(mut self, smooth: SmoothOptions) -> Self {
        self.smooth = smooth;
        self
    }

    /// Set the smoothing pass band, keeping the other smoothing options.
    pub fn with_pass_band(mut self, pass_band: f64) -> Self {
        self.smooth = self.smooth.with_pass_band(pass_band);
        self
    }

    /// Set the cleaning options.
    pub fn with_clean(mut self, clean: CleanOptions) -> Self {
        self.clean = clean;
        self
    }

    /// Set the ellipsoid tessellation resolution.
    pub fn with_ellipsoid_resolution(mut self, u_res: usize, v_res: usize) -> Self {
        self.ellipsoid_resolution = (u_res, v_res);
        self
    }

    /// Set the source of the matching volume.
    pub fn with_volume_source(mut self, source: VolumeSource) -> Self {
        self.volume_source = source;
        self
    }

    /// Set the mesh measured against the ellipsoid.
    pub fn with_deviation_source(mut self, source: DeviationSource) -> Self {
        self.deviation_source = source;
        self
    }

    /// Enable or disable parallel evaluation, in the loop and in smoothing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self.smooth = self.smooth.with_parallel(parallel);
        self
    }

    /// Run everything on the calling thread.
    pub fn sequential(self) -> Self {
        self.with_parallel(false)
    }

    /// Check parameter ranges, including the nested stage options.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(OvoidError::invalid_param("dt", self.dt, "must be positive"));
        }
        if !(self.quantile > 0.0 && self.quantile < 1.0) {
            return Err(OvoidError::invalid_param(
                "quantile",
                self.quantile,
                "must be in (0, 1)",
            ));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(OvoidError::invalid_param(
                "threshold",
                self.threshold,
                "must be positive",
            ));
        }
        let (u_res, v_res) = self.ellipsoid_resolution;
        if u_res < 3 || v_res < 3 {
            return Err(OvoidError::invalid_param(
                "ellipsoid_resolution",
                format!("{}x{}", u_res, v_res),
                "must be at least 3x3",
            ));
        }
        self.smooth.validate()?;
        self.clean.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::new(0.002);
        assert_eq!(config.dt, 0.002);
        assert_eq!(config.threshold, 0.04);
        assert_eq!(config.quantile, 0.95);
        assert_eq!(config.ellipsoid_resolution, (30, 30));
        assert_eq!(config.volume_source, VolumeSource::Flowed);
        assert_eq!(config.deviation_source, DeviationSource::Flowed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let bad = [
            FlowConfig::new(0.0),
            FlowConfig::new(f64::NAN),
            FlowConfig::new(0.1).with_quantile(1.0),
            FlowConfig::new(0.1).with_threshold(-0.5),
            FlowConfig::new(0.1).with_ellipsoid_resolution(2, 30),
            FlowConfig::new(0.1).with_pass_band(3.0),
            FlowConfig::new(0.1).with_clean(CleanOptions::default().with_tolerance(-1.0)),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(OvoidError::InvalidParameter { .. })),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_sources_are_independent() {
        let config = FlowConfig::new(0.01)
            .with_volume_source(VolumeSource::Smoothed)
            .with_deviation_source(DeviationSource::Smoothed)
            .with_volume_source(VolumeSource::Flowed);
        assert_eq!(config.volume_source, VolumeSource::Flowed);
        assert_eq!(config.deviation_source, DeviationSource::Smoothed);
    }

    #[test]
    fn test_sequential_reaches_smoothing() {
        let config = FlowConfig::new(0.1).sequential();
        assert!(!config.parallel);
        assert!(!config.smooth.parallel);
    }
}
