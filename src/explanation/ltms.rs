//! Boolean constraint propagation with justification tracking.
//!
//! Every clause of the database remembers the traced element it was derived
//! from. Every assigned variable remembers the clause that forced it, or
//! nothing if it was assumed. Walking these antecedents backwards from a
//! violated clause yields the set of elements that together contradict the
//! assumptions.

use std::collections::{BTreeSet, VecDeque};

use log::debug;

use crate::cnf::Cnf;
use crate::model::{ConstraintId, TracedElement};
use crate::types::{Lit, Variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ClauseId(usize);

/// Index into the traced elements the database was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ElementId(pub(crate) usize);

#[derive(Debug)]
struct TracedClause {
    literals: Vec<Lit>,
    element: ElementId,
}

#[derive(Debug)]
pub(crate) struct ClauseDatabase {
    clauses: Vec<TracedClause>,
    /// Clauses containing each literal, indexed by [`Lit::index`].
    occurrences: Vec<Vec<ClauseId>>,
}

impl ClauseDatabase {
    /// Clausify `elements`, leaving out the constraint `skip`.
    pub(crate) fn new(elements: &[TracedElement], skip: Option<ConstraintId>, vars: &mut Variables) -> Self {
        let mut clauses = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            if skip.is_some() && element.constraint == skip {
                continue;
            }
            for clause in Cnf::from_formula(&element.formula).into_clauses() {
                let literals = clause
                    .literals()
                    .map(|lit| Lit::new(vars.intern(&lit.name), lit.positive))
                    .collect();
                clauses.push(TracedClause {
                    literals,
                    element: ElementId(i),
                });
            }
        }

        let mut occurrences = vec![Vec::new(); 2 * (vars.len() + 1)];
        for (i, clause) in clauses.iter().enumerate() {
            for lit in &clause.literals {
                occurrences[lit.index()].push(ClauseId(i));
            }
        }
        debug!("ClauseDatabase: {} clauses over {} variables", clauses.len(), vars.len());

        Self { clauses, occurrences }
    }

    pub(crate) fn len(&self) -> usize {
        self.clauses.len()
    }

    pub(crate) fn element(&self, clause: ClauseId) -> ElementId {
        self.clauses[clause.0].element
    }

    fn literals(&self, clause: ClauseId) -> &[Lit] {
        &self.clauses[clause.0].literals
    }

    fn occurrences(&self, lit: Lit) -> &[ClauseId] {
        self.occurrences.get(lit.index()).map(Vec::as_slice).unwrap_or(&[])
    }
}

enum Status {
    Satisfied,
    Unit(Lit),
    Violated,
    Open,
}

pub(crate) struct Ltms<'db> {
    db: &'db ClauseDatabase,
    values: Vec<Option<bool>>,
    antecedents: Vec<Option<ClauseId>>,
    queue: VecDeque<Lit>,
    violations: Vec<ClauseId>,
    reported: Vec<bool>,
}

impl<'db> Ltms<'db> {
    pub(crate) fn new(db: &'db ClauseDatabase, num_vars: usize) -> Self {
        Self {
            db,
            values: vec![None; num_vars + 1],
            antecedents: vec![None; num_vars + 1],
            queue: VecDeque::new(),
            violations: Vec::new(),
            reported: vec![false; db.len()],
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.var().index()].map(|v| v == lit.is_positive())
    }

    fn assign(&mut self, lit: Lit, antecedent: Option<ClauseId>) {
        let var = lit.var().index();
        self.values[var] = Some(lit.is_positive());
        self.antecedents[var] = antecedent;
        self.queue.push_back(lit);
    }

    fn status(&self, clause: ClauseId) -> Status {
        let mut open = None;
        let mut unassigned = 0;
        for &lit in self.db.literals(clause) {
            match self.value(lit) {
                Some(true) => return Status::Satisfied,
                Some(false) => {}
                None => {
                    unassigned += 1;
                    open = Some(lit);
                }
            }
        }
        match (unassigned, open) {
            (0, _) => Status::Violated,
            (1, Some(lit)) => Status::Unit(lit),
            _ => Status::Open,
        }
    }

    /// Returns true when `clause` is a newly found violation.
    fn visit(&mut self, clause: ClauseId) -> bool {
        match self.status(clause) {
            Status::Unit(lit) => {
                self.assign(lit, Some(clause));
                false
            }
            Status::Violated if !self.reported[clause.0] => {
                self.reported[clause.0] = true;
                self.violations.push(clause);
                true
            }
            _ => false,
        }
    }

    /// Assume `assumptions` and propagate.
    ///
    /// With `stop_at_first`, propagation halts at the first violated clause.
    /// Otherwise it runs to saturation and reports every violated clause.
    pub(crate) fn propagate(&mut self, assumptions: &[Lit], stop_at_first: bool) -> &[ClauseId] {
        for &lit in assumptions {
            if self.value(lit).is_none() {
                self.assign(lit, None);
            }
        }

        let db = self.db;
        for i in 0..db.len() {
            if self.visit(ClauseId(i)) && stop_at_first {
                return &self.violations;
            }
        }
        while let Some(lit) = self.queue.pop_front() {
            for &clause in db.occurrences(-lit) {
                if self.visit(clause) && stop_at_first {
                    return &self.violations;
                }
            }
        }
        &self.violations
    }

    /// The violated clause and every antecedent reachable through its literals.
    pub(crate) fn cone(&self, violation: ClauseId) -> BTreeSet<ClauseId> {
        let mut cone = BTreeSet::new();
        let mut stack = vec![violation];
        while let Some(clause) = stack.pop() {
            if !cone.insert(clause) {
                continue;
            }
            for lit in self.db.literals(clause) {
                if let Some(antecedent) = self.antecedents[lit.var().index()] {
                    stack.push(antecedent);
                }
            }
        }
        cone
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::formula::Formula;
    use crate::model::Origin;

    fn element(formula: Formula) -> TracedElement {
        TracedElement {
            origin: Origin::Constraint,
            formula,
            constraint: None,
        }
    }

    #[test]
    fn test_unit_propagation_chain() {
        // A, A => B, B => C, C => -A
        let elements = vec![
            element(Formula::var("A")),
            element(Formula::implies(Formula::var("A"), Formula::var("B"))),
            element(Formula::implies(Formula::var("B"), Formula::var("C"))),
            element(Formula::implies(Formula::var("C"), Formula::not(Formula::var("A")))),
            element(Formula::implies(Formula::var("D"), Formula::var("E"))),
        ];
        let mut vars = Variables::new();
        let db = ClauseDatabase::new(&elements, None, &mut vars);
        let mut ltms = Ltms::new(&db, vars.len());
        let violations = ltms.propagate(&[], true).to_vec();
        assert_eq!(violations.len(), 1);

        let elements: BTreeSet<usize> = ltms.cone(violations[0]).into_iter().map(|c| db.element(c).0).collect();
        assert_eq!(elements, BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn test_assumption_stops_cone() {
        let elements = vec![
            element(Formula::implies(Formula::var("A"), Formula::var("B"))),
            element(Formula::not(Formula::var("B"))),
        ];
        let mut vars = Variables::new();
        let db = ClauseDatabase::new(&elements, None, &mut vars);
        let a = vars.intern("A");
        let mut ltms = Ltms::new(&db, vars.len());
        let violations = ltms.propagate(&[a.pos()], false).to_vec();
        assert_eq!(violations.len(), 1);
        assert_eq!(ltms.cone(violations[0]).len(), 2);
    }

    #[test]
    fn test_saturation_without_contradiction() {
        let elements = vec![element(Formula::implies(Formula::var("A"), Formula::var("B")))];
        let mut vars = Variables::new();
        let db = ClauseDatabase::new(&elements, None, &mut vars);
        let a = vars.intern("A");
        let mut ltms = Ltms::new(&db, vars.len());
        assert!(ltms.propagate(&[a.pos()], false).is_empty());
    }

    #[test]
    fn test_skip_constraint_and_unknown_assumption() {
        let mut with_id = element(Formula::not(Formula::var("A")));
        let id = crate::model::FeatureModel::new("R").add_constraint(Formula::True);
        with_id.constraint = Some(id);
        let elements = vec![with_id];
        let mut vars = Variables::new();
        let db = ClauseDatabase::new(&elements, Some(id), &mut vars);
        assert_eq!(db.len(), 0);

        // A variable interned after the database was built has no occurrences.
        let fresh = vars.intern("Fresh");
        let mut ltms = Ltms::new(&db, vars.len());
        assert!(ltms.propagate(&[fresh.neg()], true).is_empty());
    }
}
