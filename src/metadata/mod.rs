//! Domain metadata: property descriptors, enumerated ranges, and the
//! service mapping them to JSON Schema fragments.

pub mod model;
pub mod service;
pub mod transport;

pub use model::{PropertyModel, RangeEntry, RangeKind, UNBOUNDED};
pub use service::{MetadataKey, MetadataService, PropertyList, RangeList, RangeMap, CLASS_ALIASES};
pub use transport::{HttpMetadataTransport, MetadataTransport};
