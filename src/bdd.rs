//! The BDD manager.
//!
//! Nodes are hash-consed in a single arena, so two equivalent functions built
//! through the same [`Bdd`] always share the same [`Ref`]. Negation is free:
//! edges carry a complement bit, and the canonical form keeps the high edge of
//! every stored node regular.
//!
//! All binary operators are reduced to [`Bdd::apply_ite`], whose results are
//! memoized in a direct-mapped computed table.
//!
//! The manager is the solver backend of the crate: defect analysis builds the
//! feature model as one function, and assignment enumeration walks its paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::debug;

use crate::cache::Cache;
use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match self {
            OpKey::Ite(f, g, h) => pairing3(f.unsigned(), g.unsigned(), h.unsigned()),
        }
    }
}

/// Sizing knobs for a [`Bdd`] manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BddConfig {
    initial_nodes: usize,
    cache_bits: usize,
}

impl Default for BddConfig {
    fn default() -> Self {
        Self {
            initial_nodes: 1 << 12,
            cache_bits: 16,
        }
    }
}

impl BddConfig {
    /// Pre-allocated capacity of the node arena.
    pub fn with_initial_nodes(mut self, initial_nodes: usize) -> Self {
        self.initial_nodes = initial_nodes;
        self
    }

    /// The computed table holds `2^bits` entries.
    pub fn with_cache_bits(mut self, cache_bits: usize) -> Self {
        self.cache_bits = cache_bits.min(31);
        self
    }

    pub fn initial_nodes(&self) -> usize {
        self.initial_nodes
    }

    pub fn cache_bits(&self) -> usize {
        self.cache_bits
    }
}

pub struct Bdd {
    nodes: RefCell<Vec<Node>>,
    unique: RefCell<HashMap<Node, u32>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    pub fn new(config: BddConfig) -> Self {
        let mut nodes = Vec::with_capacity(config.initial_nodes.max(2));
        // Index 0 is unused, index 1 is the terminal node.
        let terminal = Node {
            variable: 0,
            low: Ref::positive(1),
            high: Ref::positive(1),
        };
        nodes.push(terminal);
        nodes.push(terminal);
        let one = Ref::positive(1);

        Self {
            nodes: RefCell::new(nodes),
            unique: RefCell::new(HashMap::with_capacity(config.initial_nodes)),
            cache: RefCell::new(Cache::new(config.cache_bits)),
            zero: -one,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(BddConfig::default())
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.borrow();
        f.debug_struct("Bdd")
            .field("nodes", &self.num_nodes())
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl Bdd {
    /// Number of allocated decision nodes (terminal excluded).
    pub fn num_nodes(&self) -> usize {
        self.nodes.borrow().len() - 2
    }

    /// Variable labelling the node, `0` for the terminal.
    pub fn variable(&self, node: Ref) -> u32 {
        self.nodes.borrow()[node.index()].variable
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.nodes.borrow()[node.index()].low;
        if node.is_negated() {
            -low
        } else {
            low
        }
    }

    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.nodes.borrow()[node.index()].high;
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == 1
    }

    /// Level used for ordering: terminals sit below every variable.
    fn level(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            u32::MAX
        } else {
            self.variable(node)
        }
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        debug!("mk(v = {}, low = {}, high = {})", v, low, high);

        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            debug!("mk: restoring canonicity");
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            debug!("mk: duplicates {} == {}", low, high);
            return low;
        }

        let node = Node {
            variable: v,
            low,
            high,
        };
        if let Some(&index) = self.unique.borrow().get(&node) {
            return Ref::positive(index);
        }
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len() as u32;
        nodes.push(node);
        self.unique.borrow_mut().insert(node, index);
        Ref::positive(index)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, self.zero, self.one)
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        if self.is_terminal(node) || v < self.variable(node) {
            return (node, node);
        }
        assert_eq!(v, self.variable(node));
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use fm_quickfix::bdd::Bdd;
    ///
    /// let bdd = Bdd::default();
    /// let x = bdd.mk_var(1);
    /// let y = bdd.mk_var(2);
    /// let z = bdd.mk_var(3);
    /// let f = bdd.apply_ite(x, y, z);
    /// let x_and_y = bdd.apply_and(x, y);
    /// let not_x_and_z = bdd.apply_and(-x, z);
    /// assert_eq!(f, bdd.apply_or(x_and_y, not_x_and_z));
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,G,~F) => ite(F,G,1)
        let g = if g == f {
            self.one
        } else if g == -f {
            self.zero
        } else {
            g
        };
        let h = if h == f {
            self.zero
        } else if h == -f {
            self.one
        } else {
            h
        };

        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // ite(~F,G,H) => ite(F,H,G)
        let (f, g, h) = if f.is_negated() { (-f, h, g) } else { (f, g, h) };
        // ite(F,~G,H) => ~ite(F,G,~H)
        let (g, h, negate) = if g.is_negated() { (-g, -h, true) } else { (g, h, false) };

        let key = OpKey::Ite(f, g, h);
        if let Some(&res) = self.cache.borrow().get(&key) {
            debug!("cache: apply_ite(f = {}, g = {}, h = {}) -> {}", f, g, h, res);
            return if negate { -res } else { res };
        }

        let m = self.level(f).min(self.level(g)).min(self.level(h));
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);
        let res = self.mk_node(m, e, t);

        self.cache.borrow_mut().insert(key, res);
        if negate {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    /// Returns true if `f => g` is valid.
    pub fn is_implies(&self, f: Ref, g: Ref) -> bool {
        self.is_zero(self.apply_and(f, -g))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_var() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        assert_eq!(bdd.variable(x), 1);
        assert_eq!(bdd.low_node(x), bdd.zero);
        assert_eq!(bdd.high_node(x), bdd.one);
        assert_eq!(bdd.mk_var(1), x);
    }

    #[test]
    fn test_not_var() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let not_x = bdd.apply_not(x);
        assert_eq!(bdd.low_node(not_x), bdd.one);
        assert_eq!(bdd.high_node(not_x), bdd.zero);
    }

    #[test]
    fn test_terminal() {
        let bdd = Bdd::default();
        assert!(bdd.is_zero(bdd.zero));
        assert!(bdd.is_one(bdd.one));
        assert_eq!(bdd.apply_not(bdd.one), bdd.zero);
        assert_eq!(bdd.apply_and(bdd.one, bdd.zero), bdd.zero);
        assert_eq!(bdd.apply_or(bdd.one, bdd.zero), bdd.one);
    }

    #[test]
    fn test_de_morgan_and() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_not(bdd.apply_and(x, y));
        let g = bdd.apply_or(-x, -y);
        assert_eq!(f, g);
    }

    #[test]
    fn test_de_morgan_or() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_not(bdd.apply_or(x, y));
        let g = bdd.apply_and(-x, -y);
        assert_eq!(f, g);
    }

    #[test]
    fn test_implication() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let x_and_y = bdd.apply_and(x, y);
        assert!(bdd.is_implies(x_and_y, x));
        assert!(!bdd.is_implies(x, x_and_y));
        assert_eq!(bdd.apply_imply(x, y), bdd.apply_or(-x, y));
    }

    #[test]
    fn test_hash_consing() {
        let bdd = Bdd::new(BddConfig::default().with_initial_nodes(16).with_cache_bits(4));
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_or(x, y);
        let before = bdd.num_nodes();
        let g = bdd.apply_not(bdd.apply_and(-x, -y));
        assert_eq!(f, g);
        assert_eq!(bdd.num_nodes(), before);
    }
}
