/// Type alias for sets that are unordered. Iteration still follows insertion order and every
/// element can be addressed by its position, which is what observation tables rely on for
/// their suffix columns.
pub type Set<S> = indexmap::IndexSet<S>;

/// Type alias for maps that are unordered.
pub type Map<K, V> = indexmap::IndexMap<K, V>;
