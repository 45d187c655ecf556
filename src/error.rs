//! Error types for ovoid.
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;

/// Result type alias using [`OvoidError`].
pub type Result<T> = std::result::Result<T, OvoidError>;

/// Errors that can occur while building, flowing, fitting or persisting meshes.
#[derive(Error, Debug)]
pub enum OvoidError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A face has (numerically) zero area, so its cotangents are undefined.
    #[error("face {face} has zero area")]
    ZeroAreaFace {
        /// The face index.
        face: usize,
    },

    /// A lumped mass entry is not strictly positive.
    #[error("mass matrix entry for vertex {vertex} is {value} (degenerate or inverted triangles)")]
    DegenerateMass {
        /// The vertex index.
        vertex: usize,
        /// The offending diagonal value.
        value: f64,
    },

    /// The total surface area is not strictly positive.
    #[error("total surface area is {area}")]
    DegenerateArea {
        /// The computed area.
        area: f64,
    },

    /// The implicit flow system could not be factorized.
    #[error("flow system (M - dt*L) is not positive definite for dt = {dt}")]
    NotPositiveDefinite {
        /// The time step used to assemble the system.
        dt: f64,
    },

    /// A solve or evaluation produced NaN or infinite values.
    #[error("non-finite values produced by {context}")]
    NonFiniteSolution {
        /// Which computation produced them.
        context: &'static str,
    },

    /// The scatter matrix of a point cloud is rank deficient.
    #[error("scatter matrix is degenerate (eigenvalues {eigenvalues:?}); point cloud is planar or linear")]
    DegenerateScatter {
        /// Eigenvalues, largest first.
        eigenvalues: [f64; 3],
    },

    /// A volume used for matching is not usable.
    #[error("invalid volume {volume} for ellipsoid matching")]
    InvalidVolume {
        /// The rejected volume.
        volume: f64,
    },

    /// Not enough points for the requested computation.
    #[error("need at least {required} points, got {actual}")]
    InsufficientPoints {
        /// Minimum number of points.
        required: usize,
        /// Number of points supplied.
        actual: usize,
    },

    /// A pipeline stage failed during an iteration.
    #[error("iteration {iteration}: {stage} failed: {source}")]
    IterationFailed {
        /// Zero-based iteration index.
        iteration: usize,
        /// The stage that failed.
        stage: Stage,
        /// The underlying failure.
        #[source]
        source: Box<OvoidError>,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid state for the requested operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl OvoidError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        OvoidError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Wrap this error as a failure of `stage` during `iteration`.
    pub fn in_stage(self, iteration: usize, stage: Stage) -> Self {
        OvoidError::IterationFailed {
            iteration,
            stage,
            source: Box::new(self),
        }
    }

    /// The pipeline stage this error was raised in, if it was wrapped by the controller.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            OvoidError::IterationFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_source() {
        let err = OvoidError::NotPositiveDefinite { dt: 0.5 }.in_stage(3, Stage::Flow);
        assert_eq!(err.stage(), Some(Stage::Flow));

        let message = err.to_string();
        assert!(message.contains("iteration 3"), "{}", message);
        assert!(message.contains("dt = 0.5"), "{}", message);

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("not positive definite"));
    }

    #[test]
    fn test_invalid_param_formats_value() {
        let err = OvoidError::invalid_param("dt", -1.0, "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid parameter: dt = -1 (must be positive)"
        );
        assert!(err.stage().is_none());
    }
}
