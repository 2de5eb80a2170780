//! The quick-fix engine: from a defect descriptor to a set of resolutions.
//!
//! Every request runs in its own [`Session`]. A session explains the defect,
//! runs the pattern checks of [`ResolutionProvider`] on the explanation, and
//! recurses into related defects that should be resolved first. A visited
//! set keeps the recursion finite: each feature is analysed once, except the
//! originally requested one, which may be re-entered once to close a loop.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

use log::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::error::DescriptorError;
use crate::explanation::{Explainer, ExplanationStrategy, Reason};
use crate::model::{ConstraintId, FeatureModel};
use crate::provider::ResolutionProvider;
use crate::resolution::{Resolution, ResolutionKind, ResolutionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefectKind {
    Dead,
    FalseOptional,
    Redundant,
    Tautology,
}

impl DefectKind {
    pub fn targets_feature(self) -> bool {
        matches!(self, DefectKind::Dead | DefectKind::FalseOptional)
    }
}

impl Display for DefectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DefectKind::Dead => write!(f, "dead"),
            DefectKind::FalseOptional => write!(f, "false-optional"),
            DefectKind::Redundant => write!(f, "redundant"),
            DefectKind::Tautology => write!(f, "tautology"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Feature(String),
    Constraint(ConstraintId),
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Feature(name) => write!(f, "'{}'", name),
            Subject::Constraint(id) => write!(f, "constraint {}", id),
        }
    }
}

/// A defect to resolve. Feature defects name a feature, constraint defects a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectDescriptor {
    kind: DefectKind,
    subject: Subject,
}

impl DefectDescriptor {
    pub fn new(kind: DefectKind, subject: Subject) -> Result<Self, DescriptorError> {
        match (&subject, kind.targets_feature()) {
            (Subject::Feature(_), true) | (Subject::Constraint(_), false) => Ok(Self { kind, subject }),
            (Subject::Constraint(_), true) => Err(DescriptorError::ExpectedFeature(kind)),
            (Subject::Feature(_), false) => Err(DescriptorError::ExpectedConstraint(kind)),
        }
    }

    pub fn dead(feature: impl Into<String>) -> Self {
        Self {
            kind: DefectKind::Dead,
            subject: Subject::Feature(feature.into()),
        }
    }

    pub fn false_optional(feature: impl Into<String>) -> Self {
        Self {
            kind: DefectKind::FalseOptional,
            subject: Subject::Feature(feature.into()),
        }
    }

    pub fn redundant(constraint: ConstraintId) -> Self {
        Self {
            kind: DefectKind::Redundant,
            subject: Subject::Constraint(constraint),
        }
    }

    pub fn tautology(constraint: ConstraintId) -> Self {
        Self {
            kind: DefectKind::Tautology,
            subject: Subject::Constraint(constraint),
        }
    }

    pub fn kind(&self) -> DefectKind {
        self.kind
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }
}

impl Display for DefectDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.subject)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuickFixConfig {
    pub strategy: ExplanationStrategy,
}

impl QuickFixConfig {
    pub fn with_strategy(mut self, strategy: ExplanationStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The subject is not part of the model.
    UnknownSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStatus {
    Done,
    Aborted(AbortReason),
}

#[derive(Debug, Clone)]
pub struct FixReport {
    pub status: FixStatus,
    pub resolutions: ResolutionSet,
}

impl FixReport {
    fn done(resolutions: ResolutionSet) -> Self {
        Self {
            status: FixStatus::Done,
            resolutions,
        }
    }

    fn aborted(reason: AbortReason) -> Self {
        Self {
            status: FixStatus::Aborted(reason),
            resolutions: ResolutionSet::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == FixStatus::Done
    }
}

/// Resolves defects of one model snapshot.
///
/// The analyzer must describe the same snapshot as `model`.
pub struct QuickFix<'a, A: Analyzer + ?Sized> {
    model: &'a FeatureModel,
    analyzer: &'a A,
    config: QuickFixConfig,
}

impl<'a, A: Analyzer + ?Sized> QuickFix<'a, A> {
    pub fn new(model: &'a FeatureModel, analyzer: &'a A) -> Self {
        Self::with_config(model, analyzer, QuickFixConfig::default())
    }

    pub fn with_config(model: &'a FeatureModel, analyzer: &'a A, config: QuickFixConfig) -> Self {
        Self {
            model,
            analyzer,
            config,
        }
    }

    pub fn resolve(&self, descriptor: &DefectDescriptor) -> FixReport {
        info!("resolve: {}", descriptor);
        match &descriptor.subject {
            Subject::Feature(name) => {
                if !self.model.contains_feature(name) {
                    warn!("resolve: unknown feature '{}'", name);
                    return FixReport::aborted(AbortReason::UnknownSubject);
                }
                let subject = if descriptor.kind == DefectKind::Dead
                    && self.analyzer.is_void()
                    && !self.model.is_root(name)
                {
                    info!("resolve: model is void, resolving the root instead of '{}'", name);
                    self.model.root_name()
                } else {
                    name.as_str()
                };
                let mut session = self.session(subject);
                match descriptor.kind {
                    DefectKind::Dead if self.analyzer.dead_features().contains(subject) => {
                        session.dead_feature(subject);
                    }
                    DefectKind::FalseOptional if self.analyzer.false_optional_features().contains(subject) => {
                        session.false_optional_feature(subject);
                    }
                    kind => debug!("resolve: '{}' is not {}", subject, kind),
                }
                FixReport::done(session.finish())
            }
            Subject::Constraint(id) => {
                let Some(constraint) = self.model.constraint(*id) else {
                    warn!("resolve: unknown constraint {}", id);
                    return FixReport::aborted(AbortReason::UnknownSubject);
                };
                let mut session = self.session(constraint.name());
                match descriptor.kind {
                    DefectKind::Redundant if self.analyzer.redundant_constraints().contains(id) => {
                        session.redundant_constraint(*id);
                    }
                    DefectKind::Tautology if self.analyzer.tautological_constraints().contains(id) => {
                        session.provider.tautology(constraint.formula(), "", &mut session.resolutions);
                    }
                    kind => debug!("resolve: constraint {} is not {}", id, kind),
                }
                FixReport::done(session.finish())
            }
        }
    }

    fn session(&self, original: &str) -> Session<'a, A> {
        Session {
            model: self.model,
            analyzer: self.analyzer,
            explainer: Explainer::new(self.model, self.config.strategy),
            provider: ResolutionProvider::new(self.model, self.analyzer),
            original: original.to_string(),
            visited: HashMap::new(),
            resolutions: ResolutionSet::new(),
        }
    }
}

/// State of one resolution request.
struct Session<'a, A: Analyzer + ?Sized> {
    model: &'a FeatureModel,
    analyzer: &'a A,
    explainer: Explainer<'a>,
    provider: ResolutionProvider<'a, A>,
    original: String,
    /// Feature name to "loop closed" flag.
    visited: HashMap<String, bool>,
    resolutions: ResolutionSet,
}

impl<'a, A: Analyzer + ?Sized> Session<'a, A> {
    fn finish(self) -> ResolutionSet {
        info!("resolve: {} resolution(s)", self.resolutions.len());
        self.resolutions
    }

    /// Mark `feature` as visited. False if it must not be analysed again.
    fn enter(&mut self, feature: &str) -> bool {
        match self.visited.get(feature) {
            None => {
                self.visited.insert(feature.to_string(), false);
                true
            }
            Some(false) if feature == self.original => {
                debug!("enter: closing the loop at '{}'", feature);
                self.visited.insert(feature.to_string(), true);
                true
            }
            Some(_) => {
                debug!("enter: '{}' already analysed", feature);
                false
            }
        }
    }

    fn is_original(&self, feature: &str) -> bool {
        feature == self.original
    }

    fn prefix(&self, feature: &str) -> String {
        if self.model.is_root(feature) {
            "[Root] ".to_string()
        } else if self.is_original(feature) {
            String::new()
        } else {
            format!("[Possible cause '{}'] ", feature)
        }
    }

    fn await_other(&mut self, features: &[String], affected: &str) {
        if features.is_empty() || !self.is_original(affected) {
            return;
        }
        self.resolutions.insert(Resolution::new(ResolutionKind::AwaitOther {
            features: features.to_vec(),
            affected: affected.to_string(),
        }));
    }

    /// Returns the number of resolutions added.
    fn dead_feature(&mut self, subject: &str) -> usize {
        if !self.enter(subject) {
            return 0;
        }
        let before = self.resolutions.len();
        let explanation = match self.explainer.dead_feature(subject) {
            Ok(explanation) => explanation,
            Err(err) => {
                debug!("dead_feature('{}'): {}", subject, err);
                return 0;
            }
        };
        let reasons: Vec<Reason> = explanation.reasons.iter().cloned().collect();
        let involved = explanation.involved_features();
        let prefix = self.prefix(subject);

        let dead: BTreeSet<String> = self.analyzer.dead_features().intersection(&involved).cloned().collect();
        let implied = self.provider.implied_features(&reasons, subject, &dead);
        for feature in &implied {
            self.dead_feature(feature);
        }
        self.await_other(&implied, subject);

        if implied.is_empty() || self.is_original(subject) {
            self.dead_feature_fixes(subject, &reasons, &involved, &prefix);
        }
        self.resolutions.len() - before
    }

    fn dead_feature_fixes(&mut self, subject: &str, reasons: &[Reason], involved: &BTreeSet<String>, prefix: &str) {
        if self.provider.deactivation(reasons, subject, prefix, &mut self.resolutions) {
            return;
        }
        if !self.model.is_root(subject) {
            self.resolutions.insert(
                Resolution::new(ResolutionKind::DeleteFeature(subject.to_string()))
                    .with_prefix(prefix)
                    .with_postfix(format!(" '{}'", subject)),
            );
        }
        self.provider.multi_alternative_implication(reasons, subject, prefix, &mut self.resolutions);

        let false_optional: BTreeSet<String> = self
            .analyzer
            .false_optional_features()
            .intersection(involved)
            .cloned()
            .collect();
        for feature in self.provider.excluding_features(reasons, subject, &false_optional) {
            self.false_optional_feature(&feature);
        }

        for reason in reasons {
            self.provider.mandatory_child(reason, prefix, &mut self.resolutions);
        }
        for candidate in involved {
            self.provider.exclusion(reasons, subject, candidate, prefix, &mut self.resolutions);
        }
        self.provider.own_exclusion(reasons, subject, prefix, &mut self.resolutions);
    }

    /// Returns the number of resolutions added.
    fn false_optional_feature(&mut self, subject: &str) -> usize {
        if !self.enter(subject) {
            return 0;
        }
        let before = self.resolutions.len();
        let explanation = match self.explainer.false_optional_feature(subject) {
            Ok(explanation) => explanation,
            Err(err) => {
                debug!("false_optional_feature('{}'): {}", subject, err);
                return 0;
            }
        };
        let reasons: Vec<Reason> = explanation.reasons.iter().cloned().collect();
        let involved = explanation.involved_features();
        let prefix = self.prefix(subject);

        let false_optional: BTreeSet<String> = self
            .analyzer
            .false_optional_features()
            .intersection(&involved)
            .cloned()
            .collect();
        let implying = self.provider.implying_features(&reasons, subject, &false_optional);
        let mut found = false;
        for feature in &implying {
            found |= self.false_optional_feature(feature) > 0;
        }
        self.await_other(&implying, subject);

        if !found || self.is_original(subject) {
            let mut impliers: Vec<String> = Vec::new();
            for reason in &reasons {
                if let Some(child) = self.provider.mandatory_child(reason, &prefix, &mut self.resolutions) {
                    if !impliers.contains(&child) {
                        impliers.push(child);
                    }
                }
            }
            // The parent forces the subject directly through a constraint.
            if let Some(parent) = self.model.parent(subject) {
                let parent = parent.name().to_string();
                if !impliers.contains(&parent) {
                    impliers.push(parent);
                }
            }
            for implier in &impliers {
                self.provider.implication_for_false_optional(
                    &reasons,
                    subject,
                    implier,
                    &prefix,
                    &mut self.resolutions,
                );
            }

            if let Some(siblings) = self.provider.dead_group_siblings(subject) {
                self.await_other(&siblings, subject);
                for sibling in &siblings {
                    self.dead_feature(sibling);
                }
            }
        }
        self.resolutions.len() - before
    }

    fn redundant_constraint(&mut self, id: ConstraintId) {
        let Some(constraint) = self.model.constraint(id) else {
            return;
        };
        match self.explainer.redundant_constraint(id) {
            Ok(explanation) => {
                self.provider
                    .redundancy(&explanation, constraint.formula(), "", &mut self.resolutions);
            }
            Err(err) => debug!("redundant_constraint({}): {}", id, err),
        }
    }
}
