use smallvec::SmallVec;

use crate::value::Value;

/// Names the three optional slots of a [`Handle`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum HandleAspect {
    Scalar,
    Sequence,
    Mapping,
}

impl HandleAspect {
    /// All aspects, in the order traversal visits them.
    pub const ALL: [Self; 3] = [Self::Scalar, Self::Sequence, Self::Mapping];
}

/// A composite container with up to three independently optional slots.
///
/// Models symbol-table-like objects that expose a scalar, a sequence, and a
/// mapping aspect at once. Absent slots stay absent through traversal. The
/// engine does not constrain what shape each present slot's value has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Handle {
    scalar: Option<Value>,
    sequence: Option<Value>,
    mapping: Option<Value>,
}

impl Handle {
    /// An empty handle; fill slots with the `with_*` builders or [`set`](Self::set).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scalar(mut self, value: Value) -> Self {
        self.scalar = Some(value);
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, value: Value) -> Self {
        self.sequence = Some(value);
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, value: Value) -> Self {
        self.mapping = Some(value);
        self
    }

    #[must_use]
    pub fn get(&self, aspect: HandleAspect) -> Option<Value> {
        match aspect {
            HandleAspect::Scalar => self.scalar,
            HandleAspect::Sequence => self.sequence,
            HandleAspect::Mapping => self.mapping,
        }
    }

    pub fn set(&mut self, aspect: HandleAspect, value: Value) {
        *self.slot_mut(aspect) = Some(value);
    }

    /// Empties a slot, returning the value it held.
    pub fn clear(&mut self, aspect: HandleAspect) -> Option<Value> {
        self.slot_mut(aspect).take()
    }

    /// The aspects currently present, in traversal order.
    #[must_use]
    pub fn present(&self) -> SmallVec<[HandleAspect; 3]> {
        HandleAspect::ALL.into_iter().filter(|&aspect| self.get(aspect).is_some()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalar.is_none() && self.sequence.is_none() && self.mapping.is_none()
    }

    fn slot_mut(&mut self, aspect: HandleAspect) -> &mut Option<Value> {
        match aspect {
            HandleAspect::Scalar => &mut self.scalar,
            HandleAspect::Sequence => &mut self.sequence,
            HandleAspect::Mapping => &mut self.mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_independent() {
        let mut handle = Handle::new().with_mapping(Value::Int(3));
        handle.set(HandleAspect::Scalar, Value::Unit);

        let present: Vec<HandleAspect> = handle.present().into_iter().collect();
        assert_eq!(present, vec![HandleAspect::Scalar, HandleAspect::Mapping]);

        assert_eq!(handle.clear(HandleAspect::Mapping), Some(Value::Int(3)));
        assert_eq!(handle.get(HandleAspect::Mapping), None);
        assert!(!handle.is_empty());
    }
}
