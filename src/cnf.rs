//! Conjunctive normal form.
//!
//! Conversion is by distribution (no auxiliary variables), so clauses stay
//! over the original feature names and can be compared across formulas.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use crate::formula::{Formula, Literal};

/// A disjunction of literals, kept as a sorted set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Clause {
    literals: BTreeSet<Literal>,
}

impl Clause {
    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            literals: literals.into_iter().collect(),
        }
    }

    pub fn literals(&self) -> impl Iterator<Item = &Literal> + '_ {
        self.literals.iter()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// A clause containing both `x` and `-x`.
    pub fn is_tautology(&self) -> bool {
        self.literals.iter().any(|lit| self.literals.contains(&lit.negated()))
    }

    fn union(&self, other: &Clause) -> Clause {
        Clause {
            literals: self.literals.union(&other.literals).cloned().collect(),
        }
    }

    pub fn to_formula(&self) -> Formula {
        let mut literals = self.literals.iter().cloned().map(Formula::Literal);
        match self.literals.len() {
            0 => Formula::False,
            1 => literals.next().unwrap_or(Formula::False),
            _ => Formula::or(literals),
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_formula())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf {
    clauses: Vec<Clause>,
}

impl Cnf {
    pub fn from_formula(formula: &Formula) -> Self {
        let mut clauses = Vec::new();
        for clause in distribute(&formula.to_nnf()) {
            if !clause.is_tautology() && !clauses.contains(&clause) {
                clauses.push(clause);
            }
        }
        Self { clauses }
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn to_formula(&self) -> Formula {
        match self.clauses.as_slice() {
            [] => Formula::True,
            [clause] => clause.to_formula(),
            clauses => Formula::and(clauses.iter().map(Clause::to_formula)),
        }
    }
}

/// Clauses of a formula already in negation normal form.
fn distribute(f: &Formula) -> Vec<Clause> {
    match f {
        Formula::Literal(lit) => vec![Clause::new([lit.clone()])],
        Formula::True => vec![],
        Formula::False => vec![Clause::new([])],
        Formula::And(fs) => fs.iter().flat_map(distribute).collect(),
        Formula::Or(fs) => {
            let mut acc = vec![Clause::new([])];
            for child in fs {
                let child_clauses = distribute(child);
                let mut next = Vec::with_capacity(acc.len() * child_clauses.len());
                for a in &acc {
                    for b in &child_clauses {
                        let clause = a.union(b);
                        if !clause.is_tautology() {
                            next.push(clause);
                        }
                    }
                }
                acc = next;
            }
            acc
        }
        // Not in NNF: normalize and retry.
        Formula::Not(_) | Formula::Implies(_, _) => distribute(&f.to_nnf()),
    }
}
