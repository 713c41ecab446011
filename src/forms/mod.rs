//! Masters, their field trees, and where they are stored

pub mod model;
pub mod storage;

pub use model::{ExpandedMaster, Field, FieldKind, Master, UNRESOLVED_KEYS};
pub use storage::{FileFormStorage, FormStorage, InMemoryFormStorage};
