//! Clause-level containment between two formulas.
//!
//! Used for redundant constraints: if every clause of one formula already
//! follows from another formula, the first can go. If only part of a formula
//! follows, the part that follows can be cut out of it.

use std::collections::BTreeSet;

use log::debug;

use crate::analysis::{Assignment, AssignmentSource};
use crate::cnf::{Clause, Cnf};
use crate::formula::Formula;
use crate::resolution::{Resolution, ResolutionKind, ResolutionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainmentOptions {
    /// Propose deleting the contained formula when it is fully implied.
    pub delete_contained: bool,
    /// Propose cutting clauses implied by the contained formula out of the container.
    pub edit_container: bool,
}

pub struct ClauseContainment<'a, S: AssignmentSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: AssignmentSource + ?Sized> ClauseContainment<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Does `clause` hold in every assignment of `models`?
    ///
    /// A literal over a feature the assignments do not mention can be falsified
    /// freely, so it never helps.
    pub fn is_implied_by(clause: &Clause, models: &BTreeSet<Assignment>) -> bool {
        models
            .iter()
            .all(|model| clause.literals().any(|lit| model.get(&lit.name) == Some(&lit.positive)))
    }

    /// Check whether `contained` follows from `container` clause by clause.
    ///
    /// Returns true if every clause of `contained` is implied.
    pub fn check(
        &self,
        contained: &Formula,
        container: &Formula,
        options: ContainmentOptions,
        prefix: &str,
        out: &mut ResolutionSet,
    ) -> bool {
        let contained_clauses = Cnf::from_formula(contained).into_clauses();
        let mut container_clauses = Cnf::from_formula(container).into_clauses();
        let original_len = container_clauses.len();

        let mut remaining: Vec<&Clause> = contained_clauses
            .iter()
            .filter(|clause| !container_clauses.contains(clause))
            .collect();

        if remaining.is_empty() {
            if options.edit_container {
                container_clauses.retain(|clause| !contained_clauses.contains(clause));
            }
        } else {
            let container_models = self.source.satisfying_assignments(container);
            remaining.retain(|clause| !Self::is_implied_by(clause, &container_models));
            if options.edit_container {
                let contained_models = self.source.satisfying_assignments(contained);
                container_clauses.retain(|clause| !Self::is_implied_by(clause, &contained_models));
            }
        }

        if options.edit_container && container_clauses.len() != original_len {
            let kind = if container_clauses.is_empty() {
                ResolutionKind::DeleteConstraint(container.clone())
            } else {
                ResolutionKind::ReplaceConstraint {
                    old: container.clone(),
                    new: Cnf::from_clauses(container_clauses).to_formula(),
                }
            };
            out.insert(Resolution::new(kind).with_prefix(prefix));
        }

        let fully_contained = remaining.is_empty();
        debug!(
            "check(contained = {}, container = {}) -> {}",
            contained, container, fully_contained
        );
        if options.delete_contained && fully_contained {
            out.insert(Resolution::new(ResolutionKind::DeleteConstraint(contained.clone())).with_prefix(prefix));
        }
        fully_contained
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::analysis::BddEnumerator;

    const DELETE: ContainmentOptions = ContainmentOptions {
        delete_contained: true,
        edit_container: false,
    };
    const EDIT: ContainmentOptions = ContainmentOptions {
        delete_contained: false,
        edit_container: true,
    };

    fn a_implies_b() -> Formula {
        Formula::implies(Formula::var("A"), Formula::var("B"))
    }

    #[test]
    fn test_syntactic_containment() {
        let source = BddEnumerator::default();
        let containment = ClauseContainment::new(&source);
        let container = Formula::and([a_implies_b(), Formula::var("C")]);
        let mut out = ResolutionSet::new();

        assert!(containment.check(&a_implies_b(), &container, DELETE, "", &mut out));
        assert!(out.contains(&ResolutionKind::DeleteConstraint(a_implies_b())));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_semantic_containment() {
        let source = BddEnumerator::default();
        let containment = ClauseContainment::new(&source);
        // A => B follows from B.
        let mut out = ResolutionSet::new();
        assert!(containment.check(&a_implies_b(), &Formula::var("B"), DELETE, "", &mut out));
        assert!(!containment.check(&Formula::var("B"), &a_implies_b(), DELETE, "", &mut out));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_edit_container() {
        let source = BddEnumerator::default();
        let containment = ClauseContainment::new(&source);
        let container = Formula::and([a_implies_b(), Formula::var("C")]);
        let mut out = ResolutionSet::new();

        assert!(containment.check(&a_implies_b(), &container, EDIT, "[Root] ", &mut out));
        let replace = ResolutionKind::ReplaceConstraint {
            old: container.clone(),
            new: Formula::var("C"),
        };
        assert_eq!(out.get(&replace).map(|r| r.prefix()), Some("[Root] "));
        assert!(!out.contains(&ResolutionKind::DeleteConstraint(a_implies_b())));
    }

    #[test]
    fn test_edit_container_to_nothing() {
        let source = BddEnumerator::default();
        let containment = ClauseContainment::new(&source);
        let stronger = Formula::and([Formula::var("A"), Formula::var("B")]);
        let mut out = ResolutionSet::new();
        assert!(!containment.check(&stronger, &a_implies_b(), EDIT, "", &mut out));
        assert!(out.contains(&ResolutionKind::DeleteConstraint(a_implies_b())));
    }

    #[test]
    fn test_unrelated_formulas() {
        let source = BddEnumerator::default();
        let containment = ClauseContainment::new(&source);
        let mut out = ResolutionSet::new();
        let options = ContainmentOptions {
            delete_contained: true,
            edit_container: true,
        };
        assert!(!containment.check(&Formula::var("X"), &a_implies_b(), options, "", &mut out));
        assert!(out.is_empty());
    }
}
