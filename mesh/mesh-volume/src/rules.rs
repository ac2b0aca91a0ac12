//! Rule tables for the local mesher.
//!
//! A rule names a way of closing one front face with a new element. The
//! tables are plain data, built once and handed to the
//! [`LocalMesher`](crate::LocalMesher) by reference.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ideal apex height of a regular tetrahedron over a unit triangle.
pub const REGULAR_TET_HEIGHT: f64 = 0.816_496_580_927_726;

/// Face shape a rule starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaseShape {
    /// A front triangle.
    Triangle,
    /// A front quad.
    Quad,
}

/// How a rule closes its base face.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RuleAction {
    /// Tetrahedron whose apex is the far corner of a front face sharing
    /// an edge with the base, if that corner is within the search radius.
    CloseAdjacent,
    /// Tetrahedron whose apex is an existing point within the search radius.
    ConnectExisting,
    /// Tetrahedron on a new point at `centroid + n·height·h`.
    InsertPoint {
        /// Apex height relative to the target size.
        height: f64,
    },
    /// Prism between the base quad and the two front triangles on its
    /// opposite edges.
    ClosePrism,
    /// Pyramid whose apex is the far corner of a front triangle sharing an
    /// edge with the base quad.
    PyramidToTriangle,
    /// Pyramid whose apex is an existing point within the search radius.
    PyramidToPoint,
    /// Pyramid on a new apex at `centroid + n·height·h`.
    PyramidInsert {
        /// Apex height relative to the target size.
        height: f64,
    },
}

impl RuleAction {
    /// Face shape the action applies to.
    #[must_use]
    pub const fn base(self) -> BaseShape {
        match self {
            Self::CloseAdjacent | Self::ConnectExisting | Self::InsertPoint { .. } => {
                BaseShape::Triangle
            }
            Self::ClosePrism
            | Self::PyramidToTriangle
            | Self::PyramidToPoint
            | Self::PyramidInsert { .. } => BaseShape::Quad,
        }
    }
}

/// One rule of a table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// Name used in logs and statistics.
    pub name: String,
    /// Face shape the rule starts from.
    pub base: BaseShape,
    /// What the rule builds.
    pub action: RuleAction,
    /// Lowest element quality accepted for a face of class 1.
    ///
    /// The threshold for a face of class `c` is `min_quality / c`.
    pub min_quality: f64,
    /// Failure class from which the rule is tried.
    pub min_class: u32,
}

impl Rule {
    /// A rule that is tried from the first failure class on.
    #[must_use]
    pub fn new(name: impl Into<String>, action: RuleAction, min_quality: f64) -> Self {
        Self {
            name: name.into(),
            base: action.base(),
            action,
            min_quality,
            min_class: 1,
        }
    }

    /// Only try the rule once a face has failed `class - 1` times.
    #[must_use]
    pub fn from_class(mut self, class: u32) -> Self {
        self.min_class = class;
        self
    }

    /// True if the rule may be tried on a face of class `class`.
    #[inline]
    #[must_use]
    pub const fn applies_at(&self, class: u32) -> bool {
        class >= self.min_class
    }

    /// Quality threshold for a face of class `class`.
    #[inline]
    #[must_use]
    pub fn threshold(&self, class: u32) -> f64 {
        self.min_quality / f64::from(class.max(1))
    }
}

/// Meshing stage a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RuleStage {
    /// Prisms over quads.
    Prism,
    /// Pyramids leaning on neighbouring triangles.
    PyramidToTriangle,
    /// Pyramids to existing or new apex points.
    PyramidToPoint,
    /// Tetrahedra.
    Tetrahedral,
}

impl RuleStage {
    /// The three quad stages in the order they run.
    pub const QUAD_STAGES: [Self; 3] = [Self::Prism, Self::PyramidToTriangle, Self::PyramidToPoint];

    /// True for stages that only work on quads.
    #[must_use]
    pub const fn is_quad_stage(self) -> bool {
        !matches!(self, Self::Tetrahedral)
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prism => "prism",
            Self::PyramidToTriangle => "pyramid-to-triangle",
            Self::PyramidToPoint => "pyramid-to-point",
            Self::Tetrahedral => "tetrahedral",
        }
    }
}

/// Ordered rules of one stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleTable {
    /// Stage the table runs in.
    pub stage: RuleStage,
    /// Rules in priority order.
    pub rules: Vec<Rule>,
}

impl RuleTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new(stage: RuleStage) -> Self {
        Self {
            stage,
            rules: Vec::new(),
        }
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Face shape the table consumes.
    #[must_use]
    pub const fn base(&self) -> BaseShape {
        if self.stage.is_quad_stage() {
            BaseShape::Quad
        } else {
            BaseShape::Triangle
        }
    }

    /// True if the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The four tables of a meshing run.
///
/// # Example
///
/// ```
/// use mesh_volume::{RuleSet, RuleStage};
///
/// let rules = RuleSet::standard();
/// assert_eq!(rules.table(RuleStage::Prism).rules.len(), 1);
/// assert!(!rules.table(RuleStage::Tetrahedral).is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleSet {
    /// Prism table.
    pub prism: RuleTable,
    /// Pyramid table leaning on triangles.
    pub pyramid_to_triangle: RuleTable,
    /// Pyramid table to existing or new points.
    pub pyramid_to_point: RuleTable,
    /// Tetrahedral table.
    pub tetrahedral: RuleTable,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleSet {
    /// The built-in tables.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            prism: RuleTable::new(RuleStage::Prism)
                .with_rule(Rule::new("close prism", RuleAction::ClosePrism, 0.1)),
            pyramid_to_triangle: RuleTable::new(RuleStage::PyramidToTriangle).with_rule(
                Rule::new("pyramid on triangle", RuleAction::PyramidToTriangle, 0.2),
            ),
            pyramid_to_point: RuleTable::new(RuleStage::PyramidToPoint)
                .with_rule(Rule::new("pyramid to point", RuleAction::PyramidToPoint, 0.3))
                .with_rule(Rule::new(
                    "pyramid new point",
                    RuleAction::PyramidInsert { height: 0.5 },
                    0.2,
                ))
                .with_rule(
                    Rule::new(
                        "flat pyramid new point",
                        RuleAction::PyramidInsert { height: 0.3 },
                        0.1,
                    )
                    .from_class(3),
                ),
            tetrahedral: RuleTable::new(RuleStage::Tetrahedral)
                .with_rule(Rule::new("close adjacent", RuleAction::CloseAdjacent, 0.2))
                .with_rule(Rule::new("connect existing", RuleAction::ConnectExisting, 0.2))
                .with_rule(Rule::new(
                    "new point",
                    RuleAction::InsertPoint {
                        height: REGULAR_TET_HEIGHT,
                    },
                    0.3,
                ))
                .with_rule(
                    Rule::new("low new point", RuleAction::InsertPoint { height: 0.4 }, 0.2)
                        .from_class(3),
                ),
        }
    }

    /// Table of `stage`.
    #[must_use]
    pub const fn table(&self, stage: RuleStage) -> &RuleTable {
        match stage {
            RuleStage::Prism => &self.prism,
            RuleStage::PyramidToTriangle => &self.pyramid_to_triangle,
            RuleStage::PyramidToPoint => &self.pyramid_to_point,
            RuleStage::Tetrahedral => &self.tetrahedral,
        }
    }

    /// Replace the table of `table.stage`.
    #[must_use]
    pub fn with_table(mut self, table: RuleTable) -> Self {
        match table.stage {
            RuleStage::Prism => self.prism = table,
            RuleStage::PyramidToTriangle => self.pyramid_to_triangle = table,
            RuleStage::PyramidToPoint => self.pyramid_to_point = table,
            RuleStage::Tetrahedral => self.tetrahedral = table,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_match_their_stage() {
        let rules = RuleSet::standard();
        for stage in RuleStage::QUAD_STAGES {
            let table = rules.table(stage);
            assert_eq!(table.stage, stage);
            assert!(table.rules.iter().all(|r| r.base == BaseShape::Quad));
        }
        assert!(rules
            .tetrahedral
            .rules
            .iter()
            .all(|r| r.base == BaseShape::Triangle));
    }

    #[test]
    fn threshold_relaxes_with_class() {
        let rule = Rule::new("r", RuleAction::CloseAdjacent, 0.3);
        assert!((rule.threshold(1) - 0.3).abs() < 1e-12);
        assert!((rule.threshold(3) - 0.1).abs() < 1e-12);
        assert!((rule.threshold(0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn late_rules_wait_for_their_class() {
        let rule = Rule::new("r", RuleAction::InsertPoint { height: 0.4 }, 0.2).from_class(3);
        assert!(!rule.applies_at(2));
        assert!(rule.applies_at(3));
        assert_eq!(rule.base, BaseShape::Triangle);
    }

    #[test]
    fn tables_can_be_replaced() {
        let rules = RuleSet::standard().with_table(RuleTable::new(RuleStage::Prism));
        assert!(rules.table(RuleStage::Prism).is_empty());
        assert_eq!(rules.table(RuleStage::Prism).base(), BaseShape::Quad);
    }
}
