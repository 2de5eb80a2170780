//! Exclusion and implication between features of a single formula.
//!
//! Both checks inspect the satisfying assignments of the formula. Enumeration
//! is exponential in the number of contained features, so every query first
//! discards candidates that do not occur in the formula and returns early
//! when nothing is left to check.

use std::collections::BTreeSet;

use crate::analysis::AssignmentSource;
use crate::formula::Formula;

pub struct ImplicationAnalyzer<'a, S: AssignmentSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: AssignmentSource + ?Sized> ImplicationAnalyzer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Candidates that are false in every satisfying assignment where `excluded` is true.
    ///
    /// A candidate equal to `excluded` is kept only if `excluded` can never be
    /// true in `formula`.
    pub fn excludes(&self, excluded: &str, candidates: &[&str], formula: &Formula) -> BTreeSet<String> {
        let contained = formula.contained_features();
        if !contained.contains(excluded) {
            return BTreeSet::new();
        }
        let mut result: BTreeSet<String> = candidates
            .iter()
            .filter(|c| contained.contains(**c))
            .map(|c| c.to_string())
            .collect();
        if result.is_empty() {
            return result;
        }

        for assignment in self.source.satisfying_assignments(formula) {
            if assignment.get(excluded) == Some(&true) {
                result.retain(|c| assignment.get(c) != Some(&true));
                if result.is_empty() {
                    break;
                }
            }
        }
        result
    }

    /// Candidates that are true in every satisfying assignment where `implied` is false,
    /// i.e. every candidate `c` with `c => implied`.
    pub fn implies(&self, implied: &str, candidates: &[&str], formula: &Formula) -> BTreeSet<String> {
        let contained = formula.contained_features();
        if !contained.contains(implied) {
            return BTreeSet::new();
        }
        let mut result: BTreeSet<String> = candidates
            .iter()
            .filter(|c| **c != implied && contained.contains(**c))
            .map(|c| c.to_string())
            .collect();
        if result.is_empty() {
            return result;
        }

        for assignment in self.source.satisfying_assignments(formula) {
            if assignment.get(implied) == Some(&false) {
                result.retain(|c| assignment.get(c) != Some(&true));
                if result.is_empty() {
                    break;
                }
            }
        }
        result
    }

    /// Is `candidate` never selected together with `excluded` in `formula`?
    pub fn is_excluding(&self, candidate: &str, excluded: &str, formula: &Formula) -> bool {
        !self.excludes(excluded, &[candidate], formula).is_empty()
    }

    /// Does `candidate` imply `implied` in `formula`?
    pub fn is_implying(&self, candidate: &str, implied: &str, formula: &Formula) -> bool {
        !self.implies(implied, &[candidate], formula).is_empty()
    }

    /// Can `feature` be true in some satisfying assignment of `formula`?
    ///
    /// Features not occurring in the formula are unconstrained by it.
    pub fn can_be_selected(&self, feature: &str, formula: &Formula) -> bool {
        if !formula.contains_feature(feature) {
            return true;
        }
        self.source
            .satisfying_assignments(formula)
            .iter()
            .any(|assignment| assignment.get(feature) == Some(&true))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::analysis::{Assignment, BddEnumerator};

    /// Counts enumerations to observe the short-circuits.
    #[derive(Default)]
    struct Counting {
        inner: BddEnumerator,
        calls: Cell<usize>,
    }

    impl AssignmentSource for Counting {
        fn satisfying_assignments(&self, formula: &Formula) -> BTreeSet<Assignment> {
            self.calls.set(self.calls.get() + 1);
            self.inner.satisfying_assignments(formula)
        }
    }

    fn hello_excludes_adjective() -> Formula {
        Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Adjective")))
    }

    #[test]
    fn test_excludes() {
        let source = BddEnumerator::default();
        let analyzer = ImplicationAnalyzer::new(&source);
        let f = hello_excludes_adjective();
        let result = analyzer.excludes("Adjective", &["Hello"], &f);
        assert_eq!(result, BTreeSet::from(["Hello".to_string()]));
        assert!(analyzer.is_excluding("Adjective", "Hello", &f));

        let g = Formula::implies(Formula::var("Hello"), Formula::var("Adjective"));
        assert!(analyzer.excludes("Adjective", &["Hello"], &g).is_empty());
    }

    #[test]
    fn test_self_exclusion() {
        let source = BddEnumerator::default();
        let analyzer = ImplicationAnalyzer::new(&source);
        let f = Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Hello")));
        assert!(analyzer.is_excluding("Hello", "Hello", &f));
        let g = Formula::or([Formula::var("Hello"), Formula::var("World")]);
        assert!(!analyzer.is_excluding("Hello", "Hello", &g));
    }

    #[test]
    fn test_implies() {
        let source = BddEnumerator::default();
        let analyzer = ImplicationAnalyzer::new(&source);
        let f = Formula::implies(Formula::var("Hello"), Formula::var("Beautiful"));
        assert!(analyzer.is_implying("Hello", "Beautiful", &f));
        assert!(!analyzer.is_implying("Beautiful", "Hello", &f));
        assert!(analyzer.implies("Hello", &["Hello"], &f).is_empty());
    }

    #[test]
    fn test_absent_features_short_circuit() {
        let source = Counting::default();
        let analyzer = ImplicationAnalyzer::new(&source);
        let f = hello_excludes_adjective();

        assert!(analyzer.excludes("World", &["Hello"], &f).is_empty());
        assert!(analyzer.excludes("Adjective", &["World"], &f).is_empty());
        assert!(analyzer.implies("World", &["Hello"], &f).is_empty());
        assert!(analyzer.can_be_selected("World", &f));
        assert_eq!(source.calls.get(), 0);

        analyzer.excludes("Adjective", &["Hello", "World"], &f);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_can_be_selected() {
        let source = BddEnumerator::default();
        let analyzer = ImplicationAnalyzer::new(&source);
        let f = Formula::not(Formula::var("Period"));
        assert!(!analyzer.can_be_selected("Period", &f));
        assert!(analyzer.can_be_selected("Period", &Formula::var("Period")));
    }
}
