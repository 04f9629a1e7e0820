//! Digital consent forms for hospital sign-off.
//!
//! Renders a consent record (patient details, bilingual procedure text and up
//! to four signatures) into a paginated A4 PDF using pdf-writer, and tracks the
//! patient, nurse and doctor sign-off sequence that regenerates it.
//! Python bindings via PyO3 are available behind the `python` feature.

mod canvas;
mod compress;
mod font_registry;
mod font_utils;
mod geometry;
mod image_registry;
mod image_utils;
mod text_layout;

pub mod artifact;
pub mod config;
pub mod error;
pub mod record;
pub mod renderer;
pub mod resources;
pub mod templates;
pub mod types;
pub mod unicode_utils;
pub mod workflow;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod test_support;

pub use artifact::{ArtifactStore, StoreConfig};
pub use config::RenderConfig;
pub use error::{ConsentError, ConsentResult};
pub use record::{ConsentRecord, Signature, SignatureSet, SignerRole};
pub use renderer::{ConsentRenderer, HeaderMark, RenderedDocument, SlotOutcome};
pub use resources::{FsResourceResolver, ResourceConfig, ResourceResolver, StaticResourceResolver};
pub use unicode_utils::{clean_text, Script};
pub use workflow::{ConsentWorkflow, SignOffState};
