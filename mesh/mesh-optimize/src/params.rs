//! Optimization parameters.

use crate::error::{OptimizeError, OptimizeResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operator string used when none is given.
pub const DEFAULT_OPERATORS: &str = "cmdmustm";

/// Default number of repair iterations without progress.
pub const DEFAULT_REPAIR_CAP: u32 = 10;

/// A local mesh improvement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operator {
    /// Collapse an interior edge (`c`).
    Combine,
    /// Split an interior edge at its midpoint (`d`).
    Split,
    /// Replace the three tets around an edge by two (`s`, `u`).
    Swap,
    /// Replace the two tets sharing a face by three (`t`).
    Swap2,
    /// Move an interior vertex towards its neighbours (`m`, `M`).
    Smooth,
}

impl Operator {
    /// Operator for a character of an operator string.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::UnknownOperator`] for any other character.
    pub const fn from_char(c: char) -> OptimizeResult<Self> {
        match c {
            'c' => Ok(Self::Combine),
            'd' => Ok(Self::Split),
            's' | 'u' => Ok(Self::Swap),
            't' => Ok(Self::Swap2),
            'm' | 'M' => Ok(Self::Smooth),
            other => Err(OptimizeError::UnknownOperator(other)),
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Combine => "combine",
            Self::Split => "split",
            Self::Swap => "swap",
            Self::Swap2 => "swap2",
            Self::Smooth => "smooth",
        }
    }
}

/// Parameters for [`optimize_volume`](crate::optimize_volume).
///
/// # Example
///
/// ```
/// use mesh_optimize::{Operator, OptimizeParams};
///
/// let params = OptimizeParams::default();
/// assert_eq!(params.steps, 3);
/// assert_eq!(params.operators[0], Operator::Combine);
///
/// assert!(OptimizeParams::from_operator_string("cx").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizeParams {
    /// Number of rounds over the operator sequence.
    pub steps: u32,

    /// Exponent `p` of the element badness `(1/q)^p`.
    pub error_power: f64,

    /// Operators applied in order during each round.
    pub operators: Vec<Operator>,

    /// Repair iterations allowed without a drop in the illegal count.
    pub repair_cap: u32,
}

impl Default for OptimizeParams {
    fn default() -> Self {
        Self {
            steps: 3,
            error_power: 2.0,
            operators: parse(DEFAULT_OPERATORS).unwrap_or_default(),
            repair_cap: DEFAULT_REPAIR_CAP,
        }
    }
}

fn parse(operators: &str) -> OptimizeResult<Vec<Operator>> {
    operators.chars().map(Operator::from_char).collect()
}

impl OptimizeParams {
    /// Create parameters with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default parameters running the given operator string.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::UnknownOperator`] for the first character
    /// that does not name an operator.
    pub fn from_operator_string(operators: &str) -> OptimizeResult<Self> {
        Ok(Self {
            operators: parse(operators)?,
            ..Self::default()
        })
    }

    /// Replace the operator sequence.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::UnknownOperator`] for an unknown character.
    pub fn with_operators(mut self, operators: &str) -> OptimizeResult<Self> {
        self.operators = parse(operators)?;
        Ok(self)
    }

    /// Set the number of rounds.
    #[must_use]
    pub const fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the badness exponent.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::InvalidErrorPower`] unless `power` is
    /// positive and finite.
    pub fn with_error_power(mut self, power: f64) -> OptimizeResult<Self> {
        if !(power.is_finite() && power > 0.0) {
            return Err(OptimizeError::InvalidErrorPower(power));
        }
        self.error_power = power;
        Ok(self)
    }

    /// Set the repair iteration cap.
    #[must_use]
    pub const fn with_repair_cap(mut self, cap: u32) -> Self {
        self.repair_cap = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_string_parses() {
        let params = OptimizeParams::default();
        assert_eq!(
            params.operators,
            vec![
                Operator::Combine,
                Operator::Smooth,
                Operator::Split,
                Operator::Smooth,
                Operator::Swap,
                Operator::Swap,
                Operator::Swap2,
                Operator::Smooth,
            ]
        );
    }

    #[test]
    fn unknown_operator_rejected() {
        assert_eq!(
            OptimizeParams::from_operator_string("cmx"),
            Err(OptimizeError::UnknownOperator('x'))
        );
        assert!(OptimizeParams::new().with_operators("").is_ok());
    }

    #[test]
    fn error_power_must_be_positive() {
        assert!(OptimizeParams::new().with_error_power(0.0).is_err());
        assert!(OptimizeParams::new().with_error_power(f64::NAN).is_err());
        let params = OptimizeParams::new().with_error_power(4.0).unwrap();
        assert!((params.error_power - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn builders() {
        let params = OptimizeParams::new().with_steps(7).with_repair_cap(2);
        assert_eq!(params.steps, 7);
        assert_eq!(params.repair_cap, 2);
    }
}
