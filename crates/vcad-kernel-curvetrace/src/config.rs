//! Traversal and curve intersection settings.

use serde::{Deserialize, Serialize};

use crate::error::{CurveTraceError, Result};
use crate::mask::MAX_LANES;

/// Incoherent-visit threshold used when none is configured.
///
/// Tuned per packet width `k` and tree fan-out `n`; zero disables the
/// switch to single-ray traversal.
pub const fn default_switch_threshold(n: usize, k: usize) -> usize {
    match k {
        4 => 3,
        8 => {
            if n == 4 {
                5
            } else {
                7
            }
        }
        16 => 14,
        _ => 0,
    }
}

/// Packet traversal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Widen frustum and slab intervals by a few ULP.
    pub robust: bool,
    /// Incoherent visits before a lane leaves the packet; `None` derives it
    /// from the tree and packet widths.
    pub switch_threshold: Option<usize>,
    /// A frustum-approved child hit by at most this many lanes counts as an
    /// incoherent visit for those lanes.
    pub divergent_lane_limit: usize,
    /// Packets with fewer active lanes start in single-ray mode.
    pub min_packet_lanes: usize,
    /// Shrink the frustum far distance as lanes find hits.
    pub update_max_dist: bool,
    /// Deepest tree the traversal stacks are sized for.
    pub max_depth: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            robust: false,
            switch_threshold: None,
            divergent_lane_limit: 1,
            min_packet_lanes: 2,
            update_max_dist: true,
            max_depth: 32,
        }
    }
}

impl TraversalConfig {
    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > 1024 {
            return Err(CurveTraceError::InvalidConfig(
                "max_depth must be between 1 and 1024".into(),
            ));
        }
        if self.divergent_lane_limit == 0 || self.divergent_lane_limit >= MAX_LANES {
            return Err(CurveTraceError::InvalidConfig(format!(
                "divergent_lane_limit must be between 1 and {}",
                MAX_LANES - 1
            )));
        }
        if self.min_packet_lanes > MAX_LANES {
            return Err(CurveTraceError::InvalidConfig(format!(
                "min_packet_lanes must not exceed {MAX_LANES}"
            )));
        }
        Ok(())
    }

    /// Effective switch threshold for fan-out `n` and packet width `k`.
    pub fn switch_threshold_for(&self, n: usize, k: usize) -> usize {
        self.switch_threshold
            .unwrap_or_else(|| default_switch_threshold(n, k))
    }
}

/// Surface model used for curve segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveGeometry {
    /// Cone between the endpoints capped by endpoint spheres.
    #[default]
    Capsule,
    /// Cross-sections swept along interpolated joint normals, marched.
    Swept,
    /// Same surface as `Swept`, solved by Newton iteration on `u`.
    SweptNewton,
    /// Ray-facing ribbon, approximate.
    Flat,
}

/// Curve intersection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Surface model.
    pub geometry: CurveGeometry,
    /// Iteration budget for the iterative solvers.
    pub max_iterations: usize,
    /// Convergence step as a fraction of the larger endpoint radius.
    pub termination_scale: f32,
    /// Largest relative residual accepted from the Newton solver.
    pub residual_tolerance: f32,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            geometry: CurveGeometry::Capsule,
            max_iterations: 200,
            termination_scale: 0.001,
            residual_tolerance: 0.01,
        }
    }
}

impl CurveConfig {
    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CurveTraceError::InvalidConfig(
                "max_iterations must be positive".into(),
            ));
        }
        if !(self.termination_scale > 0.0 && self.termination_scale < 1.0) {
            return Err(CurveTraceError::InvalidConfig(
                "termination_scale must be between 0 and 1".into(),
            ));
        }
        if !(self.residual_tolerance > 0.0) || !self.residual_tolerance.is_finite() {
            return Err(CurveTraceError::InvalidConfig(
                "residual_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        assert_eq!(default_switch_threshold(4, 4), 3);
        assert_eq!(default_switch_threshold(4, 8), 5);
        assert_eq!(default_switch_threshold(8, 8), 7);
        assert_eq!(default_switch_threshold(4, 16), 14);
        assert_eq!(default_switch_threshold(4, 2), 0);
        assert_eq!(default_switch_threshold(4, 32), 0);
    }

    #[test]
    fn test_configured_threshold_overrides_default() {
        let config = TraversalConfig {
            switch_threshold: Some(2),
            ..Default::default()
        };
        assert_eq!(config.switch_threshold_for(4, 8), 2);
        assert_eq!(TraversalConfig::default().switch_threshold_for(4, 8), 5);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(TraversalConfig::default().validate().is_ok());
        assert!(CurveConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_traversal_config() {
        let config = TraversalConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CurveTraceError::InvalidConfig(_))
        ));
        let config = TraversalConfig {
            divergent_lane_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_curve_config() {
        let config = CurveConfig {
            termination_scale: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = CurveConfig {
            residual_tolerance: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = TraversalConfig::from_toml_str("robust = true\nswitch_threshold = 4\n").unwrap();
        assert!(config.robust);
        assert_eq!(config.switch_threshold, Some(4));
        assert_eq!(config.max_depth, 32);

        let curve = CurveConfig::from_toml_str("geometry = \"swept_newton\"\n").unwrap();
        assert_eq!(curve.geometry, CurveGeometry::SweptNewton);
        assert_eq!(curve.max_iterations, 200);
    }

    #[test]
    fn test_from_toml_errors() {
        assert!(matches!(
            TraversalConfig::from_toml_str("robust = 3"),
            Err(CurveTraceError::Parse(_))
        ));
        assert!(matches!(
            TraversalConfig::from_toml_str("max_depth = 0"),
            Err(CurveTraceError::InvalidConfig(_))
        ));
    }
}
