use ahash::AHashMap;

/// Interned string identifier.
///
/// Leaf strings are deduplicated in the heap-owned [`Interner`], so two
/// `StrId`s are equal exactly when their string contents are equal. Ids are
/// only meaningful together with the heap that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StrId(u32);

impl StrId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deduplicating string store backing `Value::Str` and `TypeTag`.
///
/// Serialization persists only the string table; the reverse index is rebuilt
/// on load.
#[derive(Debug, Default)]
pub(crate) struct Interner {
    strings: Vec<String>,
    index: AHashMap<String, StrId>,
}

impl Interner {
    /// Returns the id for `s`, interning it on first sight.
    pub(crate) fn intern(&mut self, s: &str) -> StrId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = StrId(self.strings.len() as u32);
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    /// Resolves an id back to its string content.
    ///
    /// # Panics
    /// Panics if the id did not come from this interner.
    pub(crate) fn resolve(&self, id: StrId) -> &str {
        self.strings.get(id.index()).expect("Interner::resolve: unknown string id")
    }
}

impl serde::Serialize for Interner {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.strings.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Interner {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        let index = strings.iter().enumerate().map(|(i, s)| (s.clone(), StrId(i as u32))).collect();
        Ok(Self { strings, index })
    }
}
