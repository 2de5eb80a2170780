//! Propositional formulas over feature names.
//!
//! [`Formula`] is an immutable tagged union. Equality, hashing and ordering
//! are structural, so formulas can be used directly as keys when looking up
//! constraints or deduplicating resolutions.
//!
//! Formulas display in the notation used by feature-model tooling:
//!
//! ```
//! use fm_quickfix::formula::Formula;
//!
//! let f = Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Adjective")));
//! assert_eq!(f.to_string(), "Hello => -Adjective");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// A feature name with a polarity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    pub name: String,
    pub positive: bool,
}

impl Literal {
    pub fn new(name: impl Into<String>, positive: bool) -> Self {
        Self {
            name: name.into(),
            positive,
        }
    }

    pub fn negated(&self) -> Self {
        Self {
            name: self.name.clone(),
            positive: !self.positive,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.positive {
            write!(f, "-")?;
        }
        if self.name.chars().any(char::is_whitespace) {
            write!(f, "\"{}\"", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Formula {
    Literal(Literal),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    True,
    False,
}

impl Formula {
    /// Positive literal.
    pub fn var(name: impl Into<String>) -> Self {
        Formula::Literal(Literal::new(name, true))
    }

    pub fn lit(name: impl Into<String>, positive: bool) -> Self {
        Formula::Literal(Literal::new(name, positive))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(f: Formula) -> Self {
        Formula::Not(Box::new(f))
    }

    pub fn and(fs: impl IntoIterator<Item = Formula>) -> Self {
        Formula::And(fs.into_iter().collect())
    }

    pub fn or(fs: impl IntoIterator<Item = Formula>) -> Self {
        Formula::Or(fs.into_iter().collect())
    }

    pub fn implies(a: Formula, b: Formula) -> Self {
        Formula::Implies(Box::new(a), Box::new(b))
    }

    /// Names of all features syntactically present in the formula.
    pub fn contained_features(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_features(&mut names);
        names
    }

    fn collect_features(&self, names: &mut BTreeSet<String>) {
        match self {
            Formula::Literal(lit) => {
                if !names.contains(&lit.name) {
                    names.insert(lit.name.clone());
                }
            }
            Formula::Not(f) => f.collect_features(names),
            Formula::And(fs) | Formula::Or(fs) => {
                for f in fs {
                    f.collect_features(names);
                }
            }
            Formula::Implies(a, b) => {
                a.collect_features(names);
                b.collect_features(names);
            }
            Formula::True | Formula::False => {}
        }
    }

    pub fn contains_feature(&self, name: &str) -> bool {
        match self {
            Formula::Literal(lit) => lit.name == name,
            Formula::Not(f) => f.contains_feature(name),
            Formula::And(fs) | Formula::Or(fs) => fs.iter().any(|f| f.contains_feature(name)),
            Formula::Implies(a, b) => a.contains_feature(name) || b.contains_feature(name),
            Formula::True | Formula::False => false,
        }
    }

    /// True for `-name` written either as a negative literal or as `Not(name)`.
    pub fn is_negation_of(&self, name: &str) -> bool {
        match self {
            Formula::Literal(lit) => !lit.positive && lit.name == name,
            Formula::Not(inner) => matches!(inner.as_ref(), Formula::Literal(lit) if lit.positive && lit.name == name),
            _ => false,
        }
    }

    /// Evaluate under a total assignment. Missing names evaluate to false.
    pub fn evaluate(&self, assignment: &BTreeMap<String, bool>) -> bool {
        match self {
            Formula::Literal(lit) => assignment.get(&lit.name).copied().unwrap_or(false) == lit.positive,
            Formula::Not(f) => !f.evaluate(assignment),
            Formula::And(fs) => fs.iter().all(|f| f.evaluate(assignment)),
            Formula::Or(fs) => fs.iter().any(|f| f.evaluate(assignment)),
            Formula::Implies(a, b) => !a.evaluate(assignment) || b.evaluate(assignment),
            Formula::True => true,
            Formula::False => false,
        }
    }

    /// Substitute a truth value for `name` and fold constants.
    ///
    /// Subformulas not mentioning `name` keep their shape.
    pub fn assign(&self, name: &str, value: bool) -> Formula {
        if !self.contains_feature(name) {
            return self.clone();
        }
        match self {
            Formula::Literal(lit) => {
                if value == lit.positive {
                    Formula::True
                } else {
                    Formula::False
                }
            }
            Formula::Not(f) => match f.assign(name, value) {
                Formula::True => Formula::False,
                Formula::False => Formula::True,
                other => Formula::not(other),
            },
            Formula::And(fs) => {
                let mut rest = Vec::with_capacity(fs.len());
                for f in fs {
                    match f.assign(name, value) {
                        Formula::False => return Formula::False,
                        Formula::True => {}
                        other => rest.push(other),
                    }
                }
                match rest.len() {
                    0 => Formula::True,
                    1 => rest.remove(0),
                    _ => Formula::And(rest),
                }
            }
            Formula::Or(fs) => {
                let mut rest = Vec::with_capacity(fs.len());
                for f in fs {
                    match f.assign(name, value) {
                        Formula::True => return Formula::True,
                        Formula::False => {}
                        other => rest.push(other),
                    }
                }
                match rest.len() {
                    0 => Formula::False,
                    1 => rest.remove(0),
                    _ => Formula::Or(rest),
                }
            }
            Formula::Implies(a, b) => match (a.assign(name, value), b.assign(name, value)) {
                (Formula::False, _) | (_, Formula::True) => Formula::True,
                (Formula::True, b) => b,
                (a, Formula::False) => match a {
                    Formula::Not(inner) => *inner,
                    Formula::Literal(lit) => Formula::Literal(lit.negated()),
                    a => Formula::not(a),
                },
                (a, b) => Formula::implies(a, b),
            },
            Formula::True | Formula::False => self.clone(),
        }
    }

    /// Negation normal form: negations only on literals, no implications.
    pub fn to_nnf(&self) -> Formula {
        self.nnf(true)
    }

    fn nnf(&self, positive: bool) -> Formula {
        match self {
            Formula::Literal(lit) => {
                if positive {
                    Formula::Literal(lit.clone())
                } else {
                    Formula::Literal(lit.negated())
                }
            }
            Formula::Not(f) => f.nnf(!positive),
            Formula::And(fs) => {
                let children = fs.iter().map(|f| f.nnf(positive)).collect();
                if positive {
                    Formula::And(children)
                } else {
                    Formula::Or(children)
                }
            }
            Formula::Or(fs) => {
                let children = fs.iter().map(|f| f.nnf(positive)).collect();
                if positive {
                    Formula::Or(children)
                } else {
                    Formula::And(children)
                }
            }
            Formula::Implies(a, b) => {
                // a => b  ==  -a | b
                if positive {
                    Formula::Or(vec![a.nnf(false), b.nnf(true)])
                } else {
                    Formula::And(vec![a.nnf(true), b.nnf(false)])
                }
            }
            Formula::True => {
                if positive {
                    Formula::True
                } else {
                    Formula::False
                }
            }
            Formula::False => {
                if positive {
                    Formula::False
                } else {
                    Formula::True
                }
            }
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Formula::And(_) | Formula::Or(_) | Formula::Implies(_, _))
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl From<Literal> for Formula {
    fn from(lit: Literal) -> Self {
        Formula::Literal(lit)
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Literal(lit) => write!(f, "{}", lit),
            Formula::Not(inner) => {
                write!(f, "-")?;
                inner.fmt_operand(f)
            }
            Formula::And(fs) | Formula::Or(fs) => {
                let sep = if matches!(self, Formula::And(_)) { " & " } else { " | " };
                for (i, child) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
            Formula::Implies(a, b) => {
                a.fmt_operand(f)?;
                write!(f, " => ")?;
                b.fmt_operand(f)
            }
            Formula::True => write!(f, "True"),
            Formula::False => write!(f, "False"),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn hello_implies_not_adjective() -> Formula {
        Formula::implies(Formula::var("Hello"), Formula::not(Formula::var("Adjective")))
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(hello_implies_not_adjective(), hello_implies_not_adjective());
        assert_ne!(Formula::not(Formula::var("A")), Formula::lit("A", false));
    }

    #[test]
    fn test_contained_features() {
        let f = Formula::and([
            hello_implies_not_adjective(),
            Formula::or([Formula::var("Hello"), Formula::True]),
        ]);
        let names: Vec<_> = f.contained_features().into_iter().collect();
        assert_eq!(names, vec!["Adjective".to_string(), "Hello".to_string()]);
        assert!(f.contains_feature("Adjective"));
        assert!(!f.contains_feature("World"));
    }

    #[test]
    fn test_display() {
        assert_eq!(hello_implies_not_adjective().to_string(), "Hello => -Adjective");
        let f = Formula::or([
            Formula::lit("Hello", false),
            Formula::and([Formula::var("A"), Formula::var("Exclamation Mark")]),
        ]);
        assert_eq!(f.to_string(), "-Hello | (A & \"Exclamation Mark\")");
        let g = Formula::not(Formula::or([Formula::var("A"), Formula::var("B")]));
        assert_eq!(g.to_string(), "-(A | B)");
    }

    #[test]
    fn test_is_negation_of() {
        assert!(Formula::not(Formula::var("Period")).is_negation_of("Period"));
        assert!(Formula::lit("Period", false).is_negation_of("Period"));
        assert!(!Formula::var("Period").is_negation_of("Period"));
        assert!(!Formula::not(Formula::var("Period")).is_negation_of("Comma"));
    }

    #[test]
    fn test_assign_folds_constants() {
        let f = hello_implies_not_adjective();
        assert_eq!(f.assign("Hello", false), Formula::True);
        assert_eq!(f.assign("Hello", true), Formula::not(Formula::var("Adjective")));
        assert_eq!(f.assign("Adjective", true), Formula::lit("Hello", false));
        assert_eq!(f.assign("World", true), f);

        let g = Formula::or([Formula::var("A"), Formula::var("B"), Formula::var("C")]);
        assert_eq!(
            g.assign("B", false),
            Formula::or([Formula::var("A"), Formula::var("C")])
        );
    }

    #[test]
    fn test_evaluate() {
        let f = hello_implies_not_adjective();
        let mut assignment = BTreeMap::new();
        assignment.insert("Hello".to_string(), true);
        assignment.insert("Adjective".to_string(), true);
        assert!(!f.evaluate(&assignment));
        assignment.insert("Adjective".to_string(), false);
        assert!(f.evaluate(&assignment));
    }

    #[test]
    fn test_nnf() {
        let f = Formula::not(hello_implies_not_adjective());
        assert_eq!(
            f.to_nnf(),
            Formula::and([Formula::var("Hello"), Formula::var("Adjective")])
        );
    }
}
