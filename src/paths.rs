//! Iterator over satisfying paths in a BDD.
//!
//! Each path is a conjunction of literals that makes the function true.
//! Variables that do not appear on a path are don't-cares for that path.
//!
//! # Example
//!
//! ```
//! use fm_quickfix::bdd::Bdd;
//!
//! let bdd = Bdd::default();
//! let x = bdd.mk_var(1);
//! let y = bdd.mk_var(2);
//!
//! // f = x OR y: paths `x` and `~x & y`
//! let f = bdd.apply_or(x, y);
//!
//! let paths: Vec<_> = bdd.paths(f).collect();
//! assert_eq!(paths.len(), 2);
//! ```
//!
//! The number of paths can be exponential in the number of variables.

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::{Lit, Var};

impl Bdd {
    /// Returns an iterator over all paths from `node` to the ONE terminal.
    ///
    /// High branches are explored before low branches, so the literals of a
    /// path follow the variable ordering.
    pub fn paths(&self, node: Ref) -> BddPaths<'_> {
        BddPaths::new(self, node)
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    High,
    Low,
}

#[derive(Debug)]
struct StackFrame {
    node: Ref,
    next_branch: Option<Branch>,
}

pub struct BddPaths<'a> {
    bdd: &'a Bdd,
    stack: Vec<StackFrame>,
    current_path: Vec<Lit>,
}

impl<'a> BddPaths<'a> {
    fn new(bdd: &'a Bdd, root: Ref) -> Self {
        Self {
            bdd,
            stack: vec![StackFrame {
                node: root,
                next_branch: Some(Branch::High),
            }],
            current_path: Vec::new(),
        }
    }

    fn pop_frame(&mut self) {
        self.stack.pop();
        // The root frame has no incoming literal.
        if !self.stack.is_empty() {
            self.current_path.pop();
        }
    }
}

impl Iterator for BddPaths<'_> {
    type Item = Vec<Lit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if self.bdd.is_one(node) {
                let path = self.current_path.clone();
                self.pop_frame();
                return Some(path);
            }
            if self.bdd.is_zero(node) {
                self.pop_frame();
                continue;
            }

            let branch = frame.next_branch;
            frame.next_branch = match branch {
                Some(Branch::High) => Some(Branch::Low),
                _ => None,
            };

            let var = Var::new(self.bdd.variable(node));
            let (child, lit) = match branch {
                Some(Branch::High) => (self.bdd.high_node(node), var.pos()),
                Some(Branch::Low) => (self.bdd.low_node(node), var.neg()),
                None => {
                    self.pop_frame();
                    continue;
                }
            };
            self.current_path.push(lit);
            self.stack.push(StackFrame {
                node: child,
                next_branch: Some(Branch::High),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_paths_terminals() {
        let bdd = Bdd::default();
        assert_eq!(bdd.paths(bdd.zero).count(), 0);
        let paths: Vec<_> = bdd.paths(bdd.one).collect();
        assert_eq!(paths, vec![Vec::<Lit>::new()]);
    }

    #[test]
    fn test_paths_or() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.apply_or(x, y);
        let paths: Vec<_> = bdd.paths(f).collect();
        let x1 = Var::new(1);
        let x2 = Var::new(2);
        assert_eq!(paths, vec![vec![x1.pos()], vec![x1.neg(), x2.pos()]]);
    }

    #[test]
    fn test_paths_are_disjoint_and_complete() {
        let bdd = Bdd::default();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let z = bdd.mk_var(3);
        let f = bdd.apply_ite(x, y, z);
        let cubes: Vec<Ref> = bdd
            .paths(f)
            .map(|path| {
                bdd.apply_and_many(path.iter().map(|lit| {
                    let v = bdd.mk_var(lit.var().id());
                    if lit.is_positive() {
                        v
                    } else {
                        -v
                    }
                }))
            })
            .collect();
        assert_eq!(bdd.apply_or_many(cubes.iter().copied()), f);
        for (i, &a) in cubes.iter().enumerate() {
            for &b in &cubes[i + 1..] {
                assert!(bdd.is_zero(bdd.apply_and(a, b)));
            }
        }
    }
}
