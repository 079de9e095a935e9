use indexmap::IndexMap;

use crate::value::Value;

/// A keyed container with unique keys.
///
/// Backed by an insertion-ordered index map, so iteration is deterministic,
/// but that order is implementation detail rather than mapping contract. Key
/// uniqueness follows [`Value`] equality: content for leaves, identity for
/// references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: IndexMap<Value, Value, ahash::RandomState>,
}

// Serializes the entries as an ordered list of pairs; a map encoding would
// restrict keys to strings in text formats. The index is rebuilt on
// deserialize.
impl serde::Serialize for Mapping {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> serde::Deserialize<'de> for Mapping {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(Value, Value)>::deserialize(deserializer)?;
        Ok(Self::from_pairs(pairs))
    }
}

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: IndexMap::with_capacity_and_hasher(capacity, ahash::RandomState::new()) }
    }

    /// Builds a mapping from `(key, value)` pairs. Later duplicates of a key
    /// replace earlier ones.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut mapping = Self::new();
        for (key, value) in pairs {
            mapping.insert(key, value);
        }
        mapping
    }

    /// Inserts an entry, returning the previous value for the key if any.
    /// An existing key keeps its original position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: Value) -> Option<Value> {
        self.entries.get(&key).copied()
    }

    #[must_use]
    pub fn contains_key(&self, key: Value) -> bool {
        self.entries.contains_key(&key)
    }

    /// Removes an entry, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: Value) -> Option<Value> {
        self.entries.shift_remove(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.entries.iter().map(|(&key, &value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = Value> + '_ {
        self.entries.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.entries.values().copied()
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = (Value, Value);
    type IntoIter = std::iter::Map<
        indexmap::map::Iter<'a, Value, Value>,
        fn((&'a Value, &'a Value)) -> (Value, Value),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter().map(|(&key, &value)| (key, value))
    }
}
