//! Feature-name interning.
//!
//! Feature generators emit string-named features; the model works over dense
//! integer ids. `SymbolSet` maps between the two. It is plain owned state with
//! no thread-local or global instance: each `FeatureSet` owns exactly one.

use crate::error::{ReorderError, Result};
use rustc_hash::FxHashMap;
use std::fmt;

/// Dense id of an interned feature name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(u32);

impl FeatureId {
    pub fn new(id: u32) -> Self {
        FeatureId(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bidirectional name <-> id table.
#[derive(Debug, Default, Clone)]
pub struct SymbolSet {
    str_to_id: FxHashMap<Box<str>, FeatureId>,
    id_to_str: Vec<Box<str>>,
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the id of `name`, assigning the next free id when
    /// `allow_insert` is set. A new name with `allow_insert == false` is an
    /// `UnknownFeature` error.
    pub fn get_id(&mut self, name: &str, allow_insert: bool) -> Result<FeatureId> {
        if let Some(&id) = self.str_to_id.get(name) {
            return Ok(id);
        }
        if !allow_insert {
            return Err(ReorderError::UnknownFeature(name.to_string()));
        }

        let id = FeatureId(self.id_to_str.len() as u32);
        let boxed: Box<str> = name.into();
        self.str_to_id.insert(boxed.clone(), id);
        self.id_to_str.push(boxed);
        Ok(id)
    }

    /// Look up an id without ever inserting.
    pub fn find(&self, name: &str) -> Option<FeatureId> {
        self.str_to_id.get(name).copied()
    }

    /// Look up the name for an id.
    pub fn get_symbol(&self, id: FeatureId) -> Result<&str> {
        self.id_to_str
            .get(id.index())
            .map(|s| s.as_ref())
            .ok_or(ReorderError::UnknownFeatureId(id.as_u32()))
    }

    /// Number of interned names
    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    /// Iterate over `(id, name)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &str)> {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(i, s)| (FeatureId(i as u32), s.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_id_assigns_dense_ids() {
        let mut symbols = SymbolSet::new();

        let id1 = symbols.get_id("foo", true).unwrap();
        let id2 = symbols.get_id("bar", true).unwrap();
        let id3 = symbols.get_id("foo", true).unwrap();

        assert_eq!(id1, id3);
        assert_ne!(id1, id2);
        assert_eq!(id1.as_u32(), 0);
        assert_eq!(id2.as_u32(), 1);
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn test_get_id_without_insert() {
        let mut symbols = SymbolSet::new();
        symbols.get_id("known", true).unwrap();

        assert!(symbols.get_id("known", false).is_ok());
        assert_eq!(
            symbols.get_id("unseen", false),
            Err(ReorderError::UnknownFeature("unseen".to_string()))
        );
        assert_eq!(symbols.len(), 1);
    }

    #[test]
    fn test_get_symbol() {
        let mut symbols = SymbolSet::new();
        let id = symbols.get_id("SW||the", true).unwrap();

        assert_eq!(symbols.get_symbol(id), Ok("SW||the"));
        assert_eq!(
            symbols.get_symbol(FeatureId::new(7)),
            Err(ReorderError::UnknownFeatureId(7))
        );
    }

    #[test]
    fn test_iter_in_id_order() {
        let mut symbols = SymbolSet::new();
        for name in ["c", "a", "b"] {
            symbols.get_id(name, true).unwrap();
        }
        let names: Vec<_> = symbols.iter().map(|(_, s)| s).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
