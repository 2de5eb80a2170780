//! Type-safe wrappers for propositional variables and literals.
//!
//! Variables are 1-indexed (0 is reserved for terminals). Feature names are
//! mapped to variables through [`Variables`], which is shared by the BDD
//! encoding and the explanation engine.
use std::collections::HashMap;
use std::fmt;
use std::ops::Neg;

/// A variable identifier (1-indexed).
///
/// # Invariants
///
/// - Variable IDs must be >= 1 (0 is reserved for terminals)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    /// Creates a new variable with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Variables must be 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Variable IDs must be >= 1");
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Positive literal of this variable.
    pub fn pos(self) -> Lit {
        Lit::new(self, true)
    }

    /// Negative literal of this variable.
    pub fn neg(self) -> Lit {
        Lit::new(self, false)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}

/// A literal: a variable with a polarity.
///
/// Encoded as `2 * var + negated`, which makes literals usable as dense indices.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: Var, positive: bool) -> Self {
        Lit((var.0 << 1) | (!positive) as u32)
    }

    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    pub fn is_negative(self) -> bool {
        !self.is_positive()
    }

    /// Dense index of the literal.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "~")?;
        }
        write!(f, "{}", self.var())
    }
}

/// Interning table from feature names to variables.
///
/// Variables are assigned in order of first appearance, starting from 1.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    by_name: HashMap<String, Var>,
    names: Vec<String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variable for `name`, allocating a fresh one if needed.
    pub fn intern(&mut self, name: &str) -> Var {
        if let Some(&var) = self.by_name.get(name) {
            return var;
        }
        self.names.push(name.to_string());
        let var = Var::new(self.names.len() as u32);
        self.by_name.insert(name.to_string(), var);
        var
    }

    pub fn get(&self, name: &str) -> Option<Var> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, var: Var) -> &str {
        &self.names[var.index() - 1]
    }

    /// Number of allocated variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Var, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (Var::new(i as u32 + 1), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lit_encoding() {
        let x = Var::new(3);
        assert!(x.pos().is_positive());
        assert!(x.neg().is_negative());
        assert_eq!(-x.pos(), x.neg());
        assert_eq!(x.pos().var(), x);
        assert_eq!(x.neg().index(), 7);
    }

    #[test]
    fn test_interning() {
        let mut vars = Variables::new();
        let a = vars.intern("A");
        let b = vars.intern("B");
        assert_eq!(vars.intern("A"), a);
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(vars.name(b), "B");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("C"), None);
    }

    #[test]
    #[should_panic]
    fn test_zero_var() {
        Var::new(0);
    }
}
