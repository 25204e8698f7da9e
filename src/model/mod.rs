//! Document model types.
//!
//! A [`Document`] is produced once by the loader and is read-only afterwards.
//! [`Page`]s are cheap borrowed views into it, and [`OutputArtifact`]s are
//! what the exporters hand back for each page.

mod artifact;
mod document;
mod page;

pub(crate) use document::PageEntry;
pub use artifact::{ArtifactFormat, ArtifactKind, OutputArtifact};
pub use document::{Document, LoadWarning, Metadata, Validity};
pub use page::{Page, PageGeometry};
