//! Geometric parameters for surface preparation
//!
//! Thresholds are given relative to a mesh's bounding diagonal and turned
//! into absolute lengths by [`MeshingParameters::init`]. Absolute overrides
//! (`eps_input`, `ideal_edge_length`) take precedence when positive; the
//! sentinel `-1` leaves them to be derived.

use serde::{Deserialize, Serialize};
use surfmerge_core::{Error, Result};

/// Sentinel for "not specified" on length-valued fields
pub const UNSET: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingParameters {
    /// Envelope size relative to the bounding diagonal
    pub eps_rel: f64,
    /// Target edge length relative to the bounding diagonal
    pub ideal_edge_length_rel: f64,
    /// Number of envelope refinement stages, clamped to 1..=5
    pub stage: u32,
    /// Absolute envelope size, or [`UNSET`]
    pub eps_input: f64,
    /// Absolute target edge length, or [`UNSET`]
    pub ideal_edge_length: f64,

    // Derived by `init`
    pub bbox_diag_length: f64,
    pub eps: f64,
    pub eps_2: f64,
    pub eps_delta: f64,
    pub eps_coplanar: f64,
    pub eps_simplification: f64,
    pub eps_2_simplification: f64,
    pub collapse_threshold: f64,
    pub split_threshold: f64,
}

impl Default for MeshingParameters {
    fn default() -> Self {
        Self {
            eps_rel: 1e-3,
            ideal_edge_length_rel: 1.0 / 20.0,
            stage: 2,
            eps_input: UNSET,
            ideal_edge_length: UNSET,
            bbox_diag_length: 0.0,
            eps: 0.0,
            eps_2: 0.0,
            eps_delta: 0.0,
            eps_coplanar: 0.0,
            eps_simplification: 0.0,
            eps_2_simplification: 0.0,
            collapse_threshold: 0.0,
            split_threshold: 0.0,
        }
    }
}

impl MeshingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the absolute envelope size; non-positive values unset it
    pub fn with_eps_input(mut self, eps_input: f64) -> Self {
        self.eps_input = if eps_input > 0.0 { eps_input } else { UNSET };
        self
    }

    /// Override the absolute target edge length; non-positive values unset it
    pub fn with_ideal_edge_length(mut self, length: f64) -> Self {
        self.ideal_edge_length = if length > 0.0 { length } else { UNSET };
        self
    }

    /// Derive absolute thresholds from the mesh's bounding diagonal.
    ///
    /// Fails when the diagonal is not a positive finite length or when a
    /// derived threshold comes out non-positive.
    pub fn init(&mut self, bbox_diag_length: f64) -> Result<()> {
        if !(bbox_diag_length.is_finite() && bbox_diag_length > 0.0) {
            return Err(Error::ParamInit(format!(
                "bounding diagonal {} is degenerate",
                bbox_diag_length
            )));
        }
        self.stage = self.stage.clamp(1, 5);
        self.bbox_diag_length = bbox_diag_length;

        if self.ideal_edge_length > 0.0 {
            self.ideal_edge_length_rel = self.ideal_edge_length / bbox_diag_length;
        } else {
            self.ideal_edge_length = bbox_diag_length * self.ideal_edge_length_rel;
        }

        if self.eps_input > 0.0 {
            self.eps_rel = self.eps_input / bbox_diag_length;
        } else {
            self.eps_input = bbox_diag_length * self.eps_rel;
        }

        let dd = self.eps_input / self.stage as f64 / 1.5;
        self.eps = self.eps_input - dd;
        self.eps_2 = self.eps * self.eps;
        self.eps_delta = dd * 0.1;
        self.eps_coplanar = (self.eps * 0.2).min(bbox_diag_length * 1e-6);

        self.eps_simplification = self.eps_input * 0.8;
        self.eps_2_simplification = self.eps_simplification * self.eps_simplification;

        self.collapse_threshold = self.ideal_edge_length * (4.0 / 5.0);
        self.split_threshold = self.ideal_edge_length * (4.0 / 3.0);

        let derived = [
            ("eps_input", self.eps_input),
            ("eps", self.eps),
            ("eps_simplification", self.eps_simplification),
            ("eps_coplanar", self.eps_coplanar),
            ("ideal_edge_length", self.ideal_edge_length),
        ];
        if let Some((name, value)) = derived.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(Error::ParamInit(format!(
                "{} = {} is not a positive length (diagonal {})",
                name, value, bbox_diag_length
            )));
        }

        tracing::debug!(
            diagonal = bbox_diag_length,
            eps_input = self.eps_input,
            eps_simplification = self.eps_simplification,
            ideal_edge_length = self.ideal_edge_length,
            "initialized parameters"
        );
        Ok(())
    }
}
