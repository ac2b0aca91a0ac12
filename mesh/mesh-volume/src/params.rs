//! Meshing parameters.

use std::collections::BTreeMap;

use mesh_optimize::{OptimizeParams, OptimizeResult, DEFAULT_OPERATORS, DEFAULT_REPAIR_CAP};

use crate::error::{VolumeError, VolumeResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance added per attempt when a subdomain is retried.
pub const TOLERANCE_STEP: u32 = 10;

/// Open faces a pass may always add, whatever its starting front.
pub const MIN_FRONT_HEADROOM: usize = 64;

/// Parameters for a volume meshing run.
///
/// A run takes one immutable snapshot; the controller derives a
/// [`PassConfig`](crate::PassConfig) per pass from it instead of mutating it.
///
/// # Example
///
/// ```
/// use mesh_volume::MeshingParams;
///
/// let params = MeshingParams::default()
///     .with_max_cell_size(0.5)
///     .with_delaunay(false)
///     .with_max_outer_steps(4);
/// assert!(params.validate().is_ok());
/// assert_eq!(params.give_up_tolerance_for(2), 35);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshingParams {
    /// Largest allowed element size.
    ///
    /// Default: `1e10`, effectively unbounded.
    pub max_cell_size: f64,

    /// Failure class at which a triangle is abandoned on the first
    /// tetrahedral attempt, before the per-attempt increase.
    ///
    /// Default: 15.
    pub give_up_tolerance: u32,

    /// Failure class at which a quad is abandoned during the prism and
    /// pyramid stages.
    ///
    /// Default: 15.
    pub quad_give_up_tolerance: u32,

    /// Tetrahedral attempts per subdomain before giving up.
    ///
    /// Default: 10.
    pub max_outer_steps: u32,

    /// Optimizer rounds after all subdomains are filled.
    ///
    /// Default: 3.
    pub optimize_steps: u32,

    /// Exponent of the optimizer's element badness.
    ///
    /// Default: 2.0.
    pub opt_error_power: f64,

    /// Run the Delaunay fallback after the transition stages.
    ///
    /// Default: true.
    pub delaunay_enabled: bool,

    /// Delete the tetrahedra around faces a stalled pass left open before
    /// the next attempt, so the retry starts from a clean cavity.
    ///
    /// Default: true.
    pub remove_problem_regions: bool,

    /// Optimizer operator sequence.
    ///
    /// Default: `"cmdmustm"`.
    pub optimize_operator_string: String,

    /// Test boundary faces pairwise for geometric overlap before meshing.
    ///
    /// Default: true.
    pub check_overlapping_boundary: bool,

    /// Face selections allowed in a single local mesher pass.
    ///
    /// Default: 100 000.
    pub max_rule_steps: usize,

    /// Factor by which the front may outgrow the front a tetrahedral pass
    /// started from before the pass is stopped as stalled.
    ///
    /// Default: 4.
    pub max_front_growth: usize,

    /// Search level of the first tetrahedral attempt.
    ///
    /// Default: 0.
    pub initial_search_level: u32,

    /// Per-subdomain cap on the element size, applied on top of
    /// `max_cell_size`.
    pub domain_max_h: BTreeMap<u32, f64>,

    /// Illegal-element repair iterations without progress.
    ///
    /// Default: 10.
    pub repair_cap: u32,
}

impl Default for MeshingParams {
    fn default() -> Self {
        Self {
            max_cell_size: 1e10,
            give_up_tolerance: 15,
            quad_give_up_tolerance: 15,
            max_outer_steps: 10,
            optimize_steps: 3,
            opt_error_power: 2.0,
            delaunay_enabled: true,
            remove_problem_regions: true,
            optimize_operator_string: DEFAULT_OPERATORS.to_string(),
            check_overlapping_boundary: true,
            max_rule_steps: 100_000,
            max_front_growth: 4,
            initial_search_level: 0,
            domain_max_h: BTreeMap::new(),
            repair_cap: DEFAULT_REPAIR_CAP,
        }
    }
}

impl MeshingParams {
    /// Create parameters with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quick meshing: no optimization and fewer attempts.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_outer_steps: 5,
            optimize_steps: 0,
            check_overlapping_boundary: false,
            ..Self::default()
        }
    }

    /// More optimizer rounds with a steeper badness curve.
    #[must_use]
    pub fn high_quality() -> Self {
        Self {
            optimize_steps: 6,
            opt_error_power: 4.0,
            max_outer_steps: 20,
            ..Self::default()
        }
    }

    /// Set the largest allowed element size.
    #[must_use]
    pub fn with_max_cell_size(mut self, size: f64) -> Self {
        self.max_cell_size = size;
        self
    }

    /// Cap the element size inside subdomain `domain`.
    #[must_use]
    pub fn with_domain_max_h(mut self, domain: u32, size: f64) -> Self {
        self.domain_max_h.insert(domain, size);
        self
    }

    /// Set the base give-up tolerance.
    #[must_use]
    pub fn with_give_up_tolerance(mut self, tolerance: u32) -> Self {
        self.give_up_tolerance = tolerance;
        self
    }

    /// Set the attempt ceiling.
    #[must_use]
    pub fn with_max_outer_steps(mut self, steps: u32) -> Self {
        self.max_outer_steps = steps;
        self
    }

    /// Enable or disable the Delaunay fallback.
    #[must_use]
    pub fn with_delaunay(mut self, enabled: bool) -> Self {
        self.delaunay_enabled = enabled;
        self
    }

    /// Enable or disable removal of the elements around stalled faces.
    #[must_use]
    pub fn with_problem_removal(mut self, enabled: bool) -> Self {
        self.remove_problem_regions = enabled;
        self
    }

    /// Set the optimizer rounds.
    #[must_use]
    pub fn with_optimize_steps(mut self, steps: u32) -> Self {
        self.optimize_steps = steps;
        self
    }

    /// Set the optimizer operator sequence.
    #[must_use]
    pub fn with_operators(mut self, operators: impl Into<String>) -> Self {
        self.optimize_operator_string = operators.into();
        self
    }

    /// Set the optimizer badness exponent.
    #[must_use]
    pub fn with_error_power(mut self, power: f64) -> Self {
        self.opt_error_power = power;
        self
    }

    /// Enable or disable the pairwise boundary overlap test.
    #[must_use]
    pub fn with_overlap_check(mut self, enabled: bool) -> Self {
        self.check_overlapping_boundary = enabled;
        self
    }

    /// Set the face selections allowed per pass.
    #[must_use]
    pub fn with_max_rule_steps(mut self, steps: usize) -> Self {
        self.max_rule_steps = steps;
        self
    }

    /// Set how far a pass may grow the front.
    #[must_use]
    pub fn with_max_front_growth(mut self, factor: usize) -> Self {
        self.max_front_growth = factor;
        self
    }

    /// Open faces a tetrahedral pass starting from `open` faces may reach.
    ///
    /// Never below `open + MIN_FRONT_HEADROOM`, so small fronts can still
    /// insert points.
    #[must_use]
    pub const fn front_limit(&self, open: usize) -> usize {
        let grown = open.saturating_mul(self.max_front_growth);
        let floor = open.saturating_add(MIN_FRONT_HEADROOM);
        if grown > floor {
            grown
        } else {
            floor
        }
    }

    /// Give-up tolerance of tetrahedral attempt `attempt` (1-based).
    ///
    /// Grows by [`TOLERANCE_STEP`] per attempt, so it never decreases.
    #[must_use]
    pub const fn give_up_tolerance_for(&self, attempt: u32) -> u32 {
        self.give_up_tolerance
            .saturating_add(TOLERANCE_STEP.saturating_mul(attempt))
    }

    /// Element size cap for subdomain `domain`.
    #[must_use]
    pub fn max_h_for(&self, domain: u32) -> f64 {
        self.domain_max_h
            .get(&domain)
            .map_or(self.max_cell_size, |&h| h.min(self.max_cell_size))
    }

    /// Optimizer parameters derived from these settings.
    ///
    /// # Errors
    ///
    /// Fails on an unknown operator character or a non-positive power.
    pub fn optimize_params(&self) -> OptimizeResult<OptimizeParams> {
        OptimizeParams::from_operator_string(&self.optimize_operator_string)?
            .with_error_power(self.opt_error_power)
            .map(|p| {
                p.with_steps(self.optimize_steps)
                    .with_repair_cap(self.repair_cap)
            })
    }

    /// Check that sizes and powers are usable.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParams`] for a non-positive size, a
    /// non-positive error power or a zero attempt ceiling, and
    /// [`VolumeError::Optimize`] for an unknown operator.
    pub fn validate(&self) -> VolumeResult<()> {
        if !(self.max_cell_size.is_finite() && self.max_cell_size > 0.0) {
            return Err(invalid(format!(
                "max_cell_size must be positive, got {}",
                self.max_cell_size
            )));
        }
        if let Some((domain, h)) = self
            .domain_max_h
            .iter()
            .find(|(_, h)| !(h.is_finite() && **h > 0.0))
        {
            return Err(invalid(format!(
                "max h of subdomain {domain} must be positive, got {h}"
            )));
        }
        if !(self.opt_error_power.is_finite() && self.opt_error_power > 0.0) {
            return Err(invalid(format!(
                "opt_error_power must be positive, got {}",
                self.opt_error_power
            )));
        }
        if self.max_outer_steps == 0 {
            return Err(invalid("max_outer_steps must be at least 1".to_string()));
        }
        if self.max_front_growth == 0 {
            return Err(invalid("max_front_growth must be at least 1".to_string()));
        }
        self.optimize_params()?;
        Ok(())
    }
}

fn invalid(details: String) -> VolumeError {
    VolumeError::InvalidParams { details }
}
