//! Container shapes stored behind heap references.

pub mod handle;
pub mod mapping;
pub mod sequence;

pub use handle::{Handle, HandleAspect};
pub use mapping::Mapping;
pub use sequence::Sequence;
