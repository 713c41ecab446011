//! Form Compiler
//!
//! Compiles authored form definitions ("Masters") into a JSON Schema that a
//! generic form renderer can consume.
//!
//! ## Pipeline
//!
//! ```text
//! Master ──► FormExpander ──► ExpandedMaster ──► FieldCompiler ──► Schemas
//!              │ baseFormID                          │
//!              │ fieldsFormID                        ▼
//!              │ patch                         MetadataService ──► MetadataCache
//!              ▼                                     │
//!          FormStorage                        MetadataTransport
//! ```
//!
//! - **Expansion** resolves inheritance (`baseFormID`), field inclusion
//!   (`fieldsFormID`) and JSON-Patch operations into a self-contained Master.
//! - **Compilation** matches every field against the metadata of its
//!   enclosing class and synthesizes the schema, applying titles, defaults,
//!   required lists, enums and whitelists.
//! - **Metadata** lookups are memoized per (language, class) and deduplicated
//!   across concurrent requests until the cache is flushed.
//!
//! The same inputs always produce the same output; see [`Schemas::fingerprint`].

pub mod cache;
pub mod checksum;
pub mod compile;
pub mod config;
pub mod error;
pub mod expand;
pub mod forms;
pub mod json;
pub mod metadata;
pub mod schema;

pub use cache::{MetadataCache, Memoized};
pub use checksum::Fingerprint;
pub use compile::{CompilerOverrides, FieldCompiler, FormCompiler, Schemas};
pub use config::CompilerConfig;
pub use error::{CompileError, MetadataError, Result, StorageError};
pub use expand::FormExpander;
pub use forms::{
    ExpandedMaster, Field, FieldKind, FileFormStorage, FormStorage, InMemoryFormStorage, Master,
};
pub use metadata::{
    HttpMetadataTransport, MetadataService, MetadataTransport, PropertyModel, RangeEntry,
};
pub use tokio_util::sync::CancellationToken;
