//! Entity name aliasing.
//!
//! # Data Flow
//! ```text
//! aapi_names.json ([[canonical, alias], ...])
//!     → table.rs (parse once at startup, index both directions)
//!     → AliasTable (immutable, shared via Arc)
//!     → response builder resolves names on every request
//! ```

pub mod table;

pub use table::{AliasEntry, AliasError, AliasTable, NamePair};
