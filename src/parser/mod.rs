//! PDF loading module.
//!
//! Structural parsing is delegated to lopdf. When a file's cross-reference
//! data is damaged, [`recovery`] rebuilds it from the object headers so the
//! document can still be rendered.

mod loader;
pub(crate) mod objects;
mod options;
pub mod recovery;

pub use loader::{load, DocumentLoader};
pub use options::{ErrorMode, LoadOptions};
