//! Explanations for defects.
//!
//! An explanation is the set of traced elements (tree relations and
//! cross-tree constraints) that together make a defect assumption
//! contradictory. The assumption depends on the defect:
//!
//! - dead feature `X`: `X` is selected;
//! - false-optional feature `X`: the parent of `X` is selected and `X` is not;
//! - redundant constraint `C`: for every clause of `C`, that clause is
//!   violated, checked against the model without `C`.
//!
//! Propagation is run with two strategies, and the smaller explanation
//! wins. Neither guarantees a minimal unsatisfiable subset.

mod ltms;

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use log::debug;

use crate::cnf::Cnf;
use crate::error::ExplainError;
use crate::formula::Formula;
use crate::model::{ConstraintId, FeatureModel, Origin, TracedElement};
use crate::quickfix::{DefectKind, Subject};
use crate::types::{Lit, Variables};

use self::ltms::{ClauseDatabase, Ltms};

/// One atomic justification unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reason {
    pub origin: Origin,
    pub formula: Formula,
}

impl Reason {
    pub fn new(origin: Origin, formula: Formula) -> Self {
        Self { origin, formula }
    }

    /// True for user-authored cross-tree constraints.
    pub fn is_constraint(&self) -> bool {
        self.origin == Origin::Constraint
    }

    pub fn contained_features(&self) -> BTreeSet<String> {
        self.formula.contained_features()
    }
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub kind: DefectKind,
    pub subject: Subject,
    pub reasons: BTreeSet<Reason>,
}

impl Explanation {
    /// Features mentioned by any reason.
    pub fn involved_features(&self) -> BTreeSet<String> {
        self.reasons.iter().flat_map(Reason::contained_features).collect()
    }

    /// Conjunction of all reasons.
    pub fn conjunction(&self) -> Formula {
        Formula::and(self.reasons.iter().map(|r| r.formula.clone()))
    }
}

/// How propagation collects violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplanationStrategy {
    /// Run both strategies below and keep the smaller result.
    #[default]
    Shortest,
    /// Stop at the first violated clause.
    FirstViolation,
    /// Propagate to saturation and collect every violation.
    Exhaustive,
}

/// Explains defects of one model snapshot.
pub struct Explainer<'m> {
    model: &'m FeatureModel,
    elements: Vec<TracedElement>,
    strategy: ExplanationStrategy,
}

impl<'m> Explainer<'m> {
    pub fn new(model: &'m FeatureModel, strategy: ExplanationStrategy) -> Self {
        Self {
            model,
            elements: model.traced_elements(),
            strategy,
        }
    }

    pub fn dead_feature(&self, name: &str) -> Result<Explanation, ExplainError> {
        if !self.model.contains_feature(name) {
            return Err(ExplainError::UnknownFeature(name.to_string()));
        }
        let reasons = self.explain(None, &[vec![(name.to_string(), true)]])?;
        Ok(Explanation {
            kind: DefectKind::Dead,
            subject: Subject::Feature(name.to_string()),
            reasons,
        })
    }

    pub fn false_optional_feature(&self, name: &str) -> Result<Explanation, ExplainError> {
        if !self.model.contains_feature(name) {
            return Err(ExplainError::UnknownFeature(name.to_string()));
        }
        let parent = self.model.parent(name).ok_or(ExplainError::NoExplanationFound)?;
        let assumption = vec![(parent.name().to_string(), true), (name.to_string(), false)];
        let reasons = self.explain(None, &[assumption])?;
        Ok(Explanation {
            kind: DefectKind::FalseOptional,
            subject: Subject::Feature(name.to_string()),
            reasons,
        })
    }

    pub fn redundant_constraint(&self, id: ConstraintId) -> Result<Explanation, ExplainError> {
        let constraint = self.model.constraint(id).ok_or(ExplainError::UnknownConstraint(id))?;
        let assumptions: Vec<Vec<(String, bool)>> = Cnf::from_formula(constraint.formula())
            .clauses()
            .iter()
            .map(|clause| clause.literals().map(|lit| (lit.name.clone(), !lit.positive)).collect())
            .collect();
        let reasons = self.explain(Some(id), &assumptions)?;
        Ok(Explanation {
            kind: DefectKind::Redundant,
            subject: Subject::Constraint(id),
            reasons,
        })
    }

    fn explain(
        &self,
        skip: Option<ConstraintId>,
        assumptions: &[Vec<(String, bool)>],
    ) -> Result<BTreeSet<Reason>, ExplainError> {
        let mut vars = Variables::new();
        let db = ClauseDatabase::new(&self.elements, skip, &mut vars);

        let mut reasons = BTreeSet::new();
        for assumption in assumptions {
            let lits: Vec<Lit> = assumption
                .iter()
                .map(|(name, value)| Lit::new(vars.intern(name), *value))
                .collect();
            let found = match self.strategy {
                ExplanationStrategy::FirstViolation => self.run(&db, &vars, &lits, true),
                ExplanationStrategy::Exhaustive => self.run(&db, &vars, &lits, false),
                ExplanationStrategy::Shortest => {
                    let first = self.run(&db, &vars, &lits, true);
                    let all = self.run(&db, &vars, &lits, false);
                    if !first.is_empty() && size(&first) <= size(&all) {
                        first
                    } else {
                        all
                    }
                }
            };
            reasons.extend(found);
        }

        if reasons.is_empty() {
            debug!("explain: no contradiction for {:?}", assumptions);
            return Err(ExplainError::NoExplanationFound);
        }
        debug!(
            "explain: {:?} -> [{}]",
            assumptions,
            reasons.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
        );
        Ok(reasons)
    }

    fn run(&self, db: &ClauseDatabase, vars: &Variables, assumption: &[Lit], stop_at_first: bool) -> BTreeSet<Reason> {
        let mut ltms = Ltms::new(db, vars.len());
        let violations = ltms.propagate(assumption, stop_at_first).to_vec();
        violations
            .into_iter()
            .flat_map(|violation| ltms.cone(violation))
            .map(|clause| {
                let element = &self.elements[db.element(clause).0];
                Reason::new(element.origin, element.formula.clone())
            })
            .collect()
    }
}

/// Reason count first, formatted length second.
fn size(reasons: &BTreeSet<Reason>) -> (usize, usize) {
    (reasons.len(), reasons.iter().map(|r| r.to_string().len()).sum())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bdd::Bdd;
    use crate::model::GroupKind;

    /// Sentence[Hello (mandatory), Adjective, Punctuation[Period, Exclamation] (alternative)]
    fn hello_world() -> FeatureModel {
        let mut model = FeatureModel::new("Sentence");
        model.add_mandatory("Sentence", "Hello").unwrap();
        model.add_feature("Sentence", "Adjective").unwrap();
        model.add_feature("Sentence", "Punctuation").unwrap();
        model.add_feature("Punctuation", "Period").unwrap();
        model.add_feature("Punctuation", "Exclamation").unwrap();
        model.set_group("Punctuation", GroupKind::Alternative).unwrap();
        model
    }

    fn assert_sound(explanation: &Explanation, assumption: Formula) {
        let bdd = Bdd::default();
        let mut vars = Variables::new();
        let f = bdd.eval(&Formula::and([explanation.conjunction(), assumption]), &mut vars);
        assert!(bdd.is_zero(f), "explanation is not contradictory");
    }

    #[test]
    fn test_dead_by_constraint() {
        let mut model = hello_world();
        model.add_constraint(Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Adjective"))));
        let explainer = Explainer::new(&model, ExplanationStrategy::default());
        let explanation = explainer.dead_feature("Adjective").unwrap();

        assert!(explanation.reasons.contains(&Reason::new(
            Origin::Constraint,
            Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Adjective")))
        )));
        assert!(explanation.reasons.contains(&Reason::new(
            Origin::ChildDown,
            Formula::implies(Formula::var("Sentence"), Formula::var("Hello"))
        )));
        assert_sound(&explanation, Formula::var("Adjective"));
    }

    #[test]
    fn test_deactivated_feature_has_single_reason() {
        let mut model = hello_world();
        model.add_constraint(Formula::not(Formula::var("Period")));
        for strategy in [
            ExplanationStrategy::Shortest,
            ExplanationStrategy::FirstViolation,
            ExplanationStrategy::Exhaustive,
        ] {
            let explanation = Explainer::new(&model, strategy).dead_feature("Period").unwrap();
            assert_eq!(
                explanation.reasons,
                BTreeSet::from([Reason::new(Origin::Constraint, Formula::not(Formula::var("Period")))])
            );
        }
    }

    #[test]
    fn test_false_optional() {
        let mut model = hello_world();
        model.add_constraint(Formula::implies(Formula::var("Hello"), Formula::var("Adjective")));
        let explanation = Explainer::new(&model, ExplanationStrategy::default())
            .false_optional_feature("Adjective")
            .unwrap();
        assert_eq!(explanation.kind, DefectKind::FalseOptional);
        assert_eq!(explanation.reasons.len(), 2);
        assert_sound(
            &explanation,
            Formula::and([Formula::var("Sentence"), Formula::not(Formula::var("Adjective"))]),
        );
    }

    #[test]
    fn test_redundant_constraint() {
        let mut model = hello_world();
        let first = model.add_constraint(Formula::implies(Formula::var("Hello"), Formula::var("Adjective")));
        let second = model.add_constraint(Formula::or([Formula::lit("Hello", false), Formula::var("Adjective")]));
        let explainer = Explainer::new(&model, ExplanationStrategy::default());

        let explanation = explainer.redundant_constraint(second).unwrap();
        assert_eq!(
            explanation.reasons,
            BTreeSet::from([Reason::new(
                Origin::Constraint,
                Formula::implies(Formula::var("Hello"), Formula::var("Adjective"))
            )])
        );
        assert!(explainer.redundant_constraint(first).is_ok());
    }

    #[test]
    fn test_no_explanation() {
        let model = hello_world();
        let explainer = Explainer::new(&model, ExplanationStrategy::default());
        assert_eq!(explainer.dead_feature("Adjective"), Err(ExplainError::NoExplanationFound));
        assert_eq!(
            explainer.dead_feature("Missing"),
            Err(ExplainError::UnknownFeature("Missing".to_string()))
        );
        assert_eq!(explainer.false_optional_feature("Sentence"), Err(ExplainError::NoExplanationFound));
    }

    #[test]
    fn test_first_violation_is_not_larger() {
        let mut model = hello_world();
        model.add_constraint(Formula::implies(Formula::var("Adjective"), Formula::var("Period")));
        model.add_constraint(Formula::implies(Formula::var("Adjective"), Formula::var("Exclamation")));
        model.add_constraint(Formula::implies(Formula::var("Adjective"), Formula::not(Formula::var("Hello"))));
        let shortest = Explainer::new(&model, ExplanationStrategy::Shortest)
            .dead_feature("Adjective")
            .unwrap();
        let exhaustive = Explainer::new(&model, ExplanationStrategy::Exhaustive)
            .dead_feature("Adjective")
            .unwrap();
        assert!(shortest.reasons.len() <= exhaustive.reasons.len());
        assert!(shortest.reasons.is_subset(&exhaustive.reasons));
        assert_sound(&shortest, Formula::var("Adjective"));
        assert_sound(&exhaustive, Formula::var("Adjective"));
    }
}
