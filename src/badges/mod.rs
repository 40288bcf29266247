//! Badge system: static catalog plus the requirement-rule registry

mod definitions;
mod evaluator;

pub use definitions::{
    BADGES, Badge, BadgeId, Rarity, Requirement, RequirementKind, UserBadge,
};
pub use evaluator::{BadgeEvaluator, EvalContext};
