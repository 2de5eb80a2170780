//! Pattern checks that turn the reasons of an explanation into resolutions.
//!
//! Each check looks at the reasons of one defect and appends what it finds
//! to a [`ResolutionSet`]. Checks that discover further defects worth fixing
//! first return those features, and the caller decides whether to recurse.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::analysis::Analyzer;
use crate::containment::{ClauseContainment, ContainmentOptions};
use crate::explanation::{Explanation, Reason};
use crate::formula::Formula;
use crate::implication::ImplicationAnalyzer;
use crate::model::{FeatureModel, GroupKind, Origin};
use crate::resolution::{Resolution, ResolutionKind, ResolutionSet};

pub struct ResolutionProvider<'a, A: Analyzer + ?Sized> {
    model: &'a FeatureModel,
    analyzer: &'a A,
    implication: ImplicationAnalyzer<'a, A>,
    containment: ClauseContainment<'a, A>,
}

fn not(name: &str) -> Formula {
    Formula::not(Formula::var(name))
}

fn propose(out: &mut ResolutionSet, kind: ResolutionKind, prefix: &str) {
    out.insert(Resolution::new(kind).with_prefix(prefix));
}

impl<'a, A: Analyzer + ?Sized> ResolutionProvider<'a, A> {
    pub fn new(model: &'a FeatureModel, analyzer: &'a A) -> Self {
        Self {
            model,
            analyzer,
            implication: ImplicationAnalyzer::new(analyzer),
            containment: ClauseContainment::new(analyzer),
        }
    }

    /// If `reason` relates exactly a parent and its mandatory child, propose
    /// making the child optional and return it.
    pub fn mandatory_child(&self, reason: &Reason, prefix: &str, out: &mut ResolutionSet) -> Option<String> {
        let features: Vec<String> = reason.contained_features().into_iter().collect();
        let [a, b] = features.as_slice() else {
            return None;
        };
        for (parent, child) in [(a, b), (b, a)] {
            let is_child = self.model.parent(child).is_some_and(|p| p.name() == parent.as_str());
            if is_child && self.model.is_mandatory(child) {
                propose(out, ResolutionKind::MakeOptional(child.clone()), prefix);
                return Some(child.clone());
            }
        }
        None
    }

    /// Dead subject excluded outright or through a deactivated feature.
    ///
    /// Returns true if a reason is exactly `-subject`. Nothing else should be
    /// proposed for the subject then.
    pub fn deactivation(&self, reasons: &[Reason], subject: &str, prefix: &str, out: &mut ResolutionSet) -> bool {
        let root = self.model.root_name();
        for reason in reasons {
            if reason.formula.is_negation_of(subject) {
                propose(out, ResolutionKind::DeleteConstraint(reason.formula.clone()), prefix);
                return true;
            }
            if !reason.is_constraint() || !reason.formula.contains_feature(subject) {
                continue;
            }

            let excludes_root = self.implication.is_excluding(subject, root, &reason.formula);
            if excludes_root || self.implication.is_excluding(subject, subject, &reason.formula) {
                propose(
                    out,
                    ResolutionKind::ReplaceConstraint {
                        old: reason.formula.clone(),
                        new: not(subject),
                    },
                    prefix,
                );
            }

            for feature in reason.contained_features() {
                if feature == subject {
                    continue;
                }
                let substituted = reason.formula.assign(&feature, true);
                if !self.implication.can_be_selected(subject, &substituted) && self.is_deactivated(&feature) {
                    debug!("deactivation: '{}' is excluded by deactivated '{}'", subject, feature);
                    propose(out, ResolutionKind::CreateConstraint(not(subject)), prefix);
                }
            }
        }
        false
    }

    fn is_deactivated(&self, feature: &str) -> bool {
        self.model.constraints().iter().any(|c| c.formula().is_negation_of(feature))
    }

    /// `candidate` is excluded by `subject` in some reason.
    ///
    /// An alternative-group exclusion proposes turning the group into an OR
    /// group. A constraint exclusion proposes deleting or editing the
    /// constraint. The first matching reason wins.
    pub fn exclusion(&self, reasons: &[Reason], subject: &str, candidate: &str, prefix: &str, out: &mut ResolutionSet) {
        for reason in reasons {
            if !self.implication.is_excluding(candidate, subject, &reason.formula) {
                continue;
            }
            match reason.origin {
                Origin::ChildHorizontal => {
                    if let Some(parent) = self.model.parent(subject) {
                        propose(out, ResolutionKind::ConvertAlternativeToOr(parent.name().to_string()), prefix);
                    }
                    return;
                }
                Origin::Constraint => {
                    propose(out, ResolutionKind::DeleteConstraint(reason.formula.clone()), prefix);
                    propose(out, ResolutionKind::EditConstraint(reason.formula.clone()), prefix);
                    return;
                }
                _ => {}
            }
        }
    }

    /// Features of `targets` that `subject` implies in some reason.
    pub fn implied_features(&self, reasons: &[Reason], subject: &str, targets: &BTreeSet<String>) -> Vec<String> {
        let mut found = Vec::new();
        for reason in reasons {
            for target in targets {
                if target != subject
                    && !found.contains(target)
                    && reason.formula.contains_feature(target)
                    && self.implication.is_implying(subject, target, &reason.formula)
                {
                    found.push(target.clone());
                }
            }
        }
        found
    }

    /// Features of `targets` that imply `subject` in some reason.
    pub fn implying_features(&self, reasons: &[Reason], subject: &str, targets: &BTreeSet<String>) -> Vec<String> {
        self.collect(reasons, subject, targets, |reason, candidates| {
            self.implication.implies(subject, candidates, &reason.formula)
        })
    }

    /// Features of `targets` that are never selected together with `subject` in some reason.
    pub fn excluding_features(&self, reasons: &[Reason], subject: &str, targets: &BTreeSet<String>) -> Vec<String> {
        self.collect(reasons, subject, targets, |reason, candidates| {
            self.implication.excludes(subject, candidates, &reason.formula)
        })
    }

    fn collect(
        &self,
        reasons: &[Reason],
        subject: &str,
        targets: &BTreeSet<String>,
        query: impl Fn(&Reason, &[&str]) -> BTreeSet<String>,
    ) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for reason in reasons {
            let candidates: Vec<&str> = targets
                .iter()
                .map(String::as_str)
                .filter(|t| *t != subject && !found.iter().any(|f| f == t))
                .collect();
            if candidates.is_empty() {
                break;
            }
            found.extend(query(reason, &candidates));
        }
        found
    }

    /// The subject implies features of one alternative group through
    /// several constraints. At most one of them can be selected, so every
    /// constraint involved is proposed for deletion or editing.
    pub fn multi_alternative_implication(
        &self,
        reasons: &[Reason],
        subject: &str,
        prefix: &str,
        out: &mut ResolutionSet,
    ) {
        let mut by_group: BTreeMap<String, Vec<(String, Formula)>> = BTreeMap::new();
        for reason in reasons.iter().filter(|r| r.is_constraint()) {
            for feature in reason.contained_features() {
                if feature == subject {
                    continue;
                }
                let Some(parent) = self.model.parent(&feature) else {
                    continue;
                };
                if parent.group() == GroupKind::Alternative
                    && self.implication.is_implying(subject, &feature, &reason.formula)
                {
                    by_group
                        .entry(parent.name().to_string())
                        .or_default()
                        .push((feature, reason.formula.clone()));
                }
            }
        }

        for (group, implied) in by_group {
            let distinct: BTreeSet<&String> = implied.iter().map(|(feature, _)| feature).collect();
            if distinct.len() < 2 {
                continue;
            }
            debug!("multi_alternative_implication: '{}' implies {:?} below '{}'", subject, distinct, group);
            for (_, formula) in implied {
                propose(out, ResolutionKind::DeleteConstraint(formula.clone()), prefix);
                propose(out, ResolutionKind::EditConstraint(formula), prefix);
            }
        }
    }

    /// `implier` forces the false-optional `subject` through a constraint.
    ///
    /// Proposes deleting the constraint, making the subject mandatory up to
    /// the common ancestor, and editing the constraint.
    pub fn implication_for_false_optional(
        &self,
        reasons: &[Reason],
        subject: &str,
        implier: &str,
        prefix: &str,
        out: &mut ResolutionSet,
    ) {
        for reason in reasons.iter().filter(|r| r.is_constraint()) {
            if !self.implication.is_implying(implier, subject, &reason.formula) {
                continue;
            }
            propose(out, ResolutionKind::DeleteConstraint(reason.formula.clone()), prefix);
            if let Some(ancestor) = self.model.common_ancestor(&[subject, implier]) {
                if ancestor != subject {
                    propose(
                        out,
                        ResolutionKind::MakeMandatory {
                            feature: subject.to_string(),
                            ancestor: ancestor.to_string(),
                        },
                        prefix,
                    );
                }
            }
            propose(out, ResolutionKind::EditConstraint(reason.formula.clone()), prefix);
        }
    }

    /// Every sibling of `subject` in its OR or ALTERNATIVE group is dead.
    pub fn dead_group_siblings(&self, subject: &str) -> Option<Vec<String>> {
        let parent = self.model.parent(subject)?;
        if parent.group() == GroupKind::And {
            return None;
        }
        let siblings: Vec<String> = self
            .model
            .children(parent.name())
            .into_iter()
            .map(|f| f.name().to_string())
            .filter(|name| name != subject)
            .collect();
        let dead = self.analyzer.dead_features();
        if siblings.is_empty() || !siblings.iter().all(|s| dead.contains(s)) {
            return None;
        }
        Some(siblings)
    }

    /// Constraints through which the subject implies a feature that the
    /// reasons together exclude alongside the subject.
    pub fn own_exclusion(&self, reasons: &[Reason], subject: &str, prefix: &str, out: &mut ResolutionSet) {
        let mut implied: Vec<(String, &Formula)> = Vec::new();
        for reason in reasons.iter().filter(|r| r.is_constraint()) {
            for feature in reason.contained_features() {
                if feature != subject && self.implication.is_implying(subject, &feature, &reason.formula) {
                    implied.push((feature, &reason.formula));
                }
            }
        }
        if implied.is_empty() {
            return;
        }

        let all = Formula::and(reasons.iter().map(|r| r.formula.clone()));
        for (feature, formula) in implied {
            if self.implication.is_excluding(&feature, subject, &all) {
                propose(out, ResolutionKind::DeleteConstraint(formula.clone()), prefix);
                if formula.contained_features().len() > 2 {
                    propose(out, ResolutionKind::EditConstraint(formula.clone()), prefix);
                }
            }
        }
    }

    /// Resolutions for the redundant constraint `candidate`.
    pub fn redundancy(&self, explanation: &Explanation, candidate: &Formula, prefix: &str, out: &mut ResolutionSet) {
        let reasons: Vec<&Reason> = explanation.reasons.iter().collect();
        match reasons.as_slice() {
            [reason] => {
                if reason.contained_features() == candidate.contained_features()
                    && self.analyzer.satisfying_assignments(&reason.formula)
                        == self.analyzer.satisfying_assignments(candidate)
                {
                    debug!("redundancy: '{}' is equivalent to '{}'", candidate, reason.formula);
                    propose(out, ResolutionKind::DeleteConstraint(candidate.clone()), prefix);
                    return;
                }
                if !reason.is_constraint() {
                    propose(out, ResolutionKind::DeleteConstraint(candidate.clone()), prefix);
                    return;
                }
                let delete_candidate = ContainmentOptions {
                    delete_contained: true,
                    edit_container: false,
                };
                if !self.containment.check(candidate, &reason.formula, delete_candidate, prefix, out) {
                    let trim_candidate = ContainmentOptions {
                        delete_contained: false,
                        edit_container: true,
                    };
                    self.containment.check(&reason.formula, candidate, trim_candidate, prefix, out);
                }
            }
            _ => {
                let trim_candidate = ContainmentOptions {
                    delete_contained: false,
                    edit_container: true,
                };
                for reason in reasons {
                    self.containment.check(&reason.formula, candidate, trim_candidate, prefix, out);
                }
                propose(out, ResolutionKind::DeleteConstraint(candidate.clone()), prefix);
                propose(out, ResolutionKind::EditConstraint(candidate.clone()), prefix);
            }
        }
    }

    pub fn tautology(&self, candidate: &Formula, prefix: &str, out: &mut ResolutionSet) {
        propose(out, ResolutionKind::DeleteConstraint(candidate.clone()), prefix);
        propose(out, ResolutionKind::EditConstraint(candidate.clone()), prefix);
    }
}
