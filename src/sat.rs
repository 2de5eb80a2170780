use std::collections::HashMap;

use num_bigint::BigUint;

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::{Lit, Var};

impl Bdd {
    /// Returns one satisfying assignment for the BDD, if any exists.
    ///
    /// Returns `None` if the BDD represents the constant false function.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<Lit>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        while !self.is_one(current) {
            let var = Var::new(self.variable(current));
            let high = self.high_node(current);
            if !self.is_zero(high) {
                path.push(var.pos());
                current = high;
            } else {
                path.push(var.neg());
                current = self.low_node(current);
            }
        }

        Some(path)
    }

    /// Number of satisfying assignments over variables `1..=num_vars`.
    pub fn sat_count(&self, node: Ref, num_vars: usize) -> BigUint {
        let mut cache = HashMap::new();
        let max = BigUint::from(2u32).pow(num_vars as u32);
        self.sat_count_(node, &max, &mut cache)
    }

    fn sat_count_(&self, node: Ref, max: &BigUint, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if self.is_zero(node) {
            return BigUint::ZERO;
        } else if self.is_one(node) {
            return max.clone();
        }

        if let Some(count) = cache.get(&node) {
            return count.clone();
        }

        let count_low = self.sat_count_(self.low_node(node), max, cache);
        let count_high = self.sat_count_(self.high_node(node), max, cache);
        let count: BigUint = (count_low + count_high) >> 1;

        cache.insert(node, count.clone());
        count
    }

    /// All total assignments over `support` that satisfy `node`.
    ///
    /// Every path is expanded over the support variables it leaves
    /// unconstrained. Variables outside `support` must not occur in `node`.
    pub fn all_sat(&self, node: Ref, support: &[Var]) -> Vec<Vec<Lit>> {
        let mut result = Vec::new();
        for path in self.paths(node) {
            let free: Vec<Var> = support
                .iter()
                .copied()
                .filter(|v| !path.iter().any(|lit| lit.var() == *v))
                .collect();
            for bits in 0u64..(1u64 << free.len()) {
                let mut assignment = path.clone();
                for (i, &v) in free.iter().enumerate() {
                    assignment.push(Lit::new(v, (bits >> i) & 1 == 1));
                }
                assignment.sort_by_key(|lit| lit.var());
                result.push(assignment);
            }
        }
        result
    }
}
