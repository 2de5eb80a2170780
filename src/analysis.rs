//! Defect analysis of a feature model.
//!
//! [`AssignmentSource`] and [`Analyzer`] are the seams between the quick-fix
//! engine and whatever solver backs it. [`BddAnalyzer`] implements both with
//! the crate's own BDD manager: the whole model is compiled into one function
//! once, and every query afterwards is a couple of ITE calls.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use num_bigint::BigUint;

use crate::bdd::{Bdd, BddConfig};
use crate::formula::Formula;
use crate::model::{ConstraintId, FeatureModel, Origin};
use crate::reference::Ref;
use crate::types::{Var, Variables};

/// A total assignment of truth values to feature names.
pub type Assignment = BTreeMap<String, bool>;

/// Enumeration of satisfying assignments for arbitrary formulas.
pub trait AssignmentSource {
    /// All assignments over `formula.contained_features()` that satisfy `formula`.
    fn satisfying_assignments(&self, formula: &Formula) -> BTreeSet<Assignment>;
}

/// Defect sets of one model snapshot.
pub trait Analyzer: AssignmentSource {
    fn dead_features(&self) -> &BTreeSet<String>;
    fn false_optional_features(&self) -> &BTreeSet<String>;
    fn core_features(&self) -> &BTreeSet<String>;
    fn redundant_constraints(&self) -> &BTreeSet<ConstraintId>;
    fn tautological_constraints(&self) -> &BTreeSet<ConstraintId>;

    /// True if the model has no valid configuration.
    fn is_void(&self) -> bool;

    fn count_configurations(&self) -> BigUint;
}

/// Enumerates assignments with a fresh BDD per formula.
#[derive(Debug, Clone)]
pub struct BddEnumerator {
    config: BddConfig,
}

impl Default for BddEnumerator {
    fn default() -> Self {
        Self {
            config: BddConfig::default().with_initial_nodes(256).with_cache_bits(10),
        }
    }
}

impl BddEnumerator {
    pub fn new(config: BddConfig) -> Self {
        Self { config }
    }
}

impl AssignmentSource for BddEnumerator {
    fn satisfying_assignments(&self, formula: &Formula) -> BTreeSet<Assignment> {
        let bdd = Bdd::new(self.config);
        let mut vars = Variables::new();
        for name in formula.contained_features() {
            vars.intern(&name);
        }
        let f = bdd.eval(formula, &mut vars);
        let support: Vec<Var> = vars.iter().map(|(var, _)| var).collect();
        bdd.all_sat(f, &support)
            .into_iter()
            .map(|lits| {
                lits.into_iter()
                    .map(|lit| (vars.name(lit.var()).to_string(), lit.is_positive()))
                    .collect()
            })
            .collect()
    }
}

/// Snapshot analysis of a feature model backed by a BDD.
pub struct BddAnalyzer {
    bdd: Bdd,
    vars: Variables,
    valid_configs: Ref,
    enumerator: BddEnumerator,
    dead: BTreeSet<String>,
    false_optional: BTreeSet<String>,
    core: BTreeSet<String>,
    redundant: BTreeSet<ConstraintId>,
    tautologies: BTreeSet<ConstraintId>,
}

impl BddAnalyzer {
    pub fn new(model: &FeatureModel) -> Self {
        Self::with_config(model, BddConfig::default())
    }

    pub fn with_config(model: &FeatureModel, config: BddConfig) -> Self {
        let bdd = Bdd::new(config);
        let mut vars = Variables::new();
        for name in model.feature_names() {
            vars.intern(&name);
        }

        let mut tree = bdd.one;
        let mut constraints: Vec<(ConstraintId, Ref)> = Vec::new();
        for element in model.traced_elements() {
            let f = bdd.eval(&element.formula, &mut vars);
            match (element.origin, element.constraint) {
                (Origin::Constraint, Some(id)) => constraints.push((id, f)),
                _ => tree = bdd.apply_and(tree, f),
            }
        }
        let valid_configs = bdd.apply_and_many(std::iter::once(tree).chain(constraints.iter().map(|&(_, f)| f)));
        let is_void = bdd.is_zero(valid_configs);
        debug!("BddAnalyzer: {} variables, {} nodes, void = {}", vars.len(), bdd.num_nodes(), is_void);

        let var_of = |name: &str, vars: &Variables| vars.get(name).map(|v| bdd.mk_var(v.id()));

        let mut dead = BTreeSet::new();
        let mut core = BTreeSet::new();
        let mut false_optional = BTreeSet::new();
        for feature in model.features() {
            let Some(x) = var_of(feature.name(), &vars) else {
                continue;
            };
            if bdd.is_zero(bdd.apply_and(valid_configs, x)) {
                dead.insert(feature.name().to_string());
                continue;
            }
            if bdd.is_zero(bdd.apply_and(valid_configs, -x)) {
                core.insert(feature.name().to_string());
            }
            if model.is_mandatory(feature.name()) {
                continue;
            }
            let Some(parent) = model.parent(feature.name()).and_then(|p| var_of(p.name(), &vars)) else {
                continue;
            };
            let with_parent = bdd.apply_and(valid_configs, parent);
            if !bdd.is_zero(with_parent) && bdd.is_zero(bdd.apply_and(with_parent, -x)) {
                false_optional.insert(feature.name().to_string());
            }
        }

        let mut redundant = BTreeSet::new();
        let mut tautologies = BTreeSet::new();
        for (i, &(id, f)) in constraints.iter().enumerate() {
            if bdd.is_one(f) {
                tautologies.insert(id);
                continue;
            }
            if is_void {
                continue;
            }
            let others = constraints
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &(_, g))| g);
            let rest = bdd.apply_and_many(std::iter::once(tree).chain(others));
            if bdd.is_implies(rest, f) {
                redundant.insert(id);
            }
        }

        info!(
            "analysis: {} dead, {} false-optional, {} core, {} redundant, {} tautologies",
            dead.len(),
            false_optional.len(),
            core.len(),
            redundant.len(),
            tautologies.len()
        );

        Self {
            bdd,
            vars,
            valid_configs,
            enumerator: BddEnumerator::default(),
            dead,
            false_optional,
            core,
            redundant,
            tautologies,
        }
    }

    /// Check whether a (partial) configuration can be extended to a valid one.
    pub fn is_configuration_valid(&self, config: &Assignment) -> bool {
        let mut partial = self.valid_configs;
        for (name, &value) in config {
            let Some(var) = self.vars.get(name) else {
                continue;
            };
            let x = self.bdd.mk_var(var.id());
            partial = self.bdd.apply_and(partial, if value { x } else { -x });
            if self.bdd.is_zero(partial) {
                return false;
            }
        }
        true
    }

    /// Find one valid configuration.
    pub fn find_one_configuration(&self) -> Option<Assignment> {
        let lits = self.bdd.one_sat(self.valid_configs)?;
        Some(
            lits.into_iter()
                .map(|lit| (self.vars.name(lit.var()).to_string(), lit.is_positive()))
                .collect(),
        )
    }
}

impl AssignmentSource for BddAnalyzer {
    fn satisfying_assignments(&self, formula: &Formula) -> BTreeSet<Assignment> {
        self.enumerator.satisfying_assignments(formula)
    }
}

impl Analyzer for BddAnalyzer {
    fn dead_features(&self) -> &BTreeSet<String> {
        &self.dead
    }

    fn false_optional_features(&self) -> &BTreeSet<String> {
        &self.false_optional
    }

    fn core_features(&self) -> &BTreeSet<String> {
        &self.core
    }

    fn redundant_constraints(&self) -> &BTreeSet<ConstraintId> {
        &self.redundant
    }

    fn tautological_constraints(&self) -> &BTreeSet<ConstraintId> {
        &self.tautologies
    }

    fn is_void(&self) -> bool {
        self.bdd.is_zero(self.valid_configs)
    }

    /// Counted over every variable of the model, including names that only
    /// occur in constraints.
    fn count_configurations(&self) -> BigUint {
        self.bdd.sat_count(self.valid_configs, self.vars.len())
    }
}
