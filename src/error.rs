use crate::model::ConstraintId;
use crate::quickfix::DefectKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("feature '{0}' already exists")]
    DuplicateFeature(String),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("the root feature '{0}' cannot be removed")]
    CannotRemoveRoot(String),

    #[error("features {0:?} do not share the parent '{1}'")]
    NotSiblings(Vec<String>, String),
}

/// Rejected defect descriptors. Raised before any analysis runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("a {0} defect must name a feature")]
    ExpectedFeature(DefectKind),

    #[error("a {0} defect must name a constraint")]
    ExpectedConstraint(DefectKind),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplainError {
    #[error("propagation saturated without a contradiction")]
    NoExplanationFound,

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("unknown constraint {0}")]
    UnknownConstraint(ConstraintId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("another edit is already in progress")]
    Busy,

    #[error("no edit in progress")]
    NotEditing,

    #[error(transparent)]
    Model(#[from] ModelError),
}
