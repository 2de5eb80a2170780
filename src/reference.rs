use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Handle to a BDD node.
///
/// The sign encodes a complement edge: `-r` is the negation of `r`.
/// Index `1` is the terminal node, so `Ref(1)` is ONE and `Ref(-1)` is ZERO.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Ref(i32);

impl Ref {
    pub(crate) const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(&self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the internal representation of the reference.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the index of the referenced node.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Representation suitable for hashing: `2 * index + sign`.
    pub(crate) const fn unsigned(self) -> u64 {
        ((self.0.unsigned_abs() as u64) << 1) | (self.0 < 0) as u64
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation() {
        let r = Ref::positive(5);
        assert!(!r.is_negated());
        assert!((-r).is_negated());
        assert_eq!(-(-r), r);
        assert_eq!((-r).index(), 5);
        assert_eq!(format!("{}", -r), "~@5");
    }

    #[test]
    fn test_unsigned_is_injective() {
        let a = Ref::positive(3);
        assert_ne!(a.unsigned(), (-a).unsigned());
        assert_eq!(a.unsigned(), 6);
        assert_eq!((-a).unsigned(), 7);
    }
}
