//! Union-find over signed signals.

use crate::sig::Sig;
use ahash::AHashMap;

/// Merges signals proven equal (or complementary). The stored map sends a
/// positive key to its signed representative; absent keys are their own
/// representatives. Representatives always have the smallest magnitude of
/// their class, so rewriting through [`EquivalenceManager::find`] only ever
/// shrinks ids.
#[derive(Default)]
pub struct EquivalenceManager {
    map: AHashMap<i32, Sig>,
}

impl EquivalenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of signals that point at a different representative.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether `s`'s variable has been merged into another class.
    pub fn has_equivalence(&self, s: Sig) -> bool {
        self.map.contains_key(&s.var())
    }

    /// The signed representative of `s`, with path compression.
    pub fn find(&mut self, s: Sig) -> Sig {
        let root = self.find_root(s.var());
        s.apply_sign(root)
    }

    fn find_root(&mut self, key: i32) -> Sig {
        let Some(&next) = self.map.get(&key) else {
            return Sig::new(key);
        };
        debug_assert_ne!(next.var(), key);
        let root = next.apply_sign(self.find_root(next.var()));
        self.map.insert(key, root);
        root
    }

    pub fn is_equivalent(&mut self, a: Sig, b: Sig) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge the classes of `a` and `b`, keeping the smaller magnitude as
    /// representative and recording the relative sign.
    pub fn add_equivalence(&mut self, a: Sig, b: Sig) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        if root_a.var() < root_b.var() {
            self.map.insert(root_b.var(), root_b.apply_sign(root_a));
        } else {
            self.map.insert(root_a.var(), root_a.apply_sign(root_b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(n: i32) -> Sig {
        Sig::new(n)
    }

    #[test]
    fn find_is_idempotent() {
        let mut eq = EquivalenceManager::new();
        eq.add_equivalence(s(3), s(7));
        eq.add_equivalence(s(7), s(12));
        let r = eq.find(s(12));
        assert_eq!(eq.find(r), r);
        assert_eq!(r, s(3));
    }

    #[test]
    fn closed_under_negation() {
        let mut eq = EquivalenceManager::new();
        eq.add_equivalence(s(2), s(-5));
        assert_eq!(eq.find(s(5)), s(-2));
        assert_eq!(eq.find(s(-5)), s(2));
        assert_eq!(eq.find(s(-2)), s(-2));
    }

    #[test]
    fn representative_is_smallest() {
        let mut eq = EquivalenceManager::new();
        eq.add_equivalence(s(9), s(4));
        eq.add_equivalence(s(4), s(-11));
        assert_eq!(eq.find(s(9)), s(4));
        assert_eq!(eq.find(s(11)), s(-4));
        assert!(eq.has_equivalence(s(11)));
        assert!(!eq.has_equivalence(s(4)));
    }

    #[test]
    fn sign_chains_compose() {
        let mut eq = EquivalenceManager::new();
        eq.add_equivalence(s(1), s(-2));
        eq.add_equivalence(s(2), s(-3));
        // 3 == -2 == 1
        assert_eq!(eq.find(s(3)), s(1));
        assert_eq!(eq.find(s(-3)), s(-1));
    }
}
