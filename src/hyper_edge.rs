//! Grammar productions of the reordering ITG.
//!
//! A `HyperEdge` names one production by its source boundaries and type. It
//! carries no payload, so it doubles as the key of the chart's feature cache.

use std::fmt;

/// The kind of production an edge applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeType {
    /// Terminal kept in source order.
    Forward,
    /// Terminal with its words reversed.
    Backward,
    /// Two adjacent sub-spans kept in order.
    Straight,
    /// Two adjacent sub-spans swapped.
    Inverted,
    /// Synthetic production over the whole sentence.
    Root,
}

impl EdgeType {
    /// Single-character tag used in feature names and debug output.
    pub fn as_char(self) -> char {
        match self {
            EdgeType::Forward => 'F',
            EdgeType::Backward => 'B',
            EdgeType::Straight => 'S',
            EdgeType::Inverted => 'I',
            EdgeType::Root => 'R',
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EdgeType::Forward | EdgeType::Backward)
    }

    pub fn is_binary(self) -> bool {
        matches!(self, EdgeType::Straight | EdgeType::Inverted)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One production over source span `[left, right]`, split at `center` for
/// binary types and `-1` otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HyperEdge {
    pub left: i32,
    pub center: i32,
    pub right: i32,
    pub edge_type: EdgeType,
}

impl HyperEdge {
    pub fn new(left: i32, center: i32, right: i32, edge_type: EdgeType) -> Self {
        HyperEdge {
            left,
            center,
            right,
            edge_type,
        }
    }

    /// Create a terminal edge (forward or backward) over `[left, right]`.
    pub fn terminal(left: i32, right: i32, edge_type: EdgeType) -> Self {
        HyperEdge::new(left, -1, right, edge_type)
    }

    /// Number of source words covered.
    pub fn len(&self) -> usize {
        (self.right - self.left + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source span of the left child, for binary edges.
    pub fn left_child_span(&self) -> Option<(i32, i32)> {
        self.edge_type
            .is_binary()
            .then_some((self.left, self.center - 1))
    }

    /// Source span of the right child, for binary edges.
    pub fn right_child_span(&self) -> Option<(i32, i32)> {
        self.edge_type
            .is_binary()
            .then_some((self.center, self.right))
    }
}

impl fmt::Display for HyperEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {})",
            self.edge_type, self.left, self.center, self.right
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_structural_equality() {
        let a = HyperEdge::new(0, 1, 2, EdgeType::Straight);
        let b = HyperEdge::new(0, 1, 2, EdgeType::Straight);
        let c = HyperEdge::new(0, 1, 2, EdgeType::Inverted);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut map = FxHashMap::default();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn test_child_spans() {
        let edge = HyperEdge::new(2, 4, 6, EdgeType::Inverted);
        assert_eq!(edge.left_child_span(), Some((2, 3)));
        assert_eq!(edge.right_child_span(), Some((4, 6)));
        assert_eq!(edge.len(), 5);

        let term = HyperEdge::terminal(3, 3, EdgeType::Backward);
        assert_eq!(term.center, -1);
        assert_eq!(term.left_child_span(), None);
    }

    #[test]
    fn test_display() {
        let edge = HyperEdge::terminal(0, 2, EdgeType::Forward);
        assert_eq!(format!("{}", edge), "F(0, -1, 2)");
    }
}
