mod assembler;
mod constants;
mod deck;
mod footer;
mod layout;
mod merger;
mod merger_config;
mod normalizer;
mod package;
mod parse_rels;
mod part_copy;
mod shapes;
mod slide;
mod types;
mod xml_tree;

pub use assembler::{AssemblyReport, DeckAssembler};
pub use constants::{cm_to_emu, EMU_PER_CM, PPTX_CONTENT_TYPE};
pub use deck::{Deck, SlideRef};
pub use footer::{apply_footer_overlay, has_footer_overlap, OVERLAY_NAME_PREFIX};
pub use layout::{layout_type, unify_layouts, UnifiedLayout};
pub use merger::SlideMerger;
pub use merger_config::{MergerConfig, MergerConfigBuilder, TemplateMarkers};
pub use normalizer::NormalizerClient;
pub use package::Package;
pub use parse_rels::{relative_target, resolve_target, Relationship, Relationships};
pub use part_copy::{PartCopier, RelIdMap};
pub use shapes::{visual_elements, ShapeKind, VisualElement};
pub use slide::{
    apply_page_numbering, area_color, replace_area, replace_text, replace_text_color, run_color,
    slide_contains_text,
};
pub use types::*;
pub use xml_tree::{XmlDocument, XmlElement, XmlNode};

use std::time::Duration;

/// Coarse classification of failures, used by callers to decide on retries and on
/// how to report a failed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The uploaded file or request fields were rejected before any work started.
    Validation,
    /// The template asset does not have the shape the merge expects.
    Template,
    /// A package could not be opened, cloned or saved.
    PackageIntegrity,
    /// The normalizer service failed or timed out.
    ExternalDependency,
    /// The merge was aborted by the caller.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML read error: {0}")]
    XmlRead(#[from] quick_xml::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Template mismatch: {0}")]
    Template(String),

    #[error("Package integrity: {0}")]
    Integrity(String),

    #[error("Part not found: {0}")]
    MissingPart(String),

    #[error("Normalizer responded with status {status}: {body}")]
    Normalizer { status: u16, body: String },

    #[error("Normalizer did not answer within {0:?}")]
    NormalizerTimeout(Duration),

    #[error("Merge cancelled")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Template(_) => ErrorKind::Template,
            Error::Http(_) | Error::Normalizer { .. } | Error::NormalizerTimeout(_) => {
                ErrorKind::ExternalDependency
            }
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Zip(_)
            | Error::Xml(_)
            | Error::XmlRead(_)
            | Error::Utf8(_)
            | Error::Io(_)
            | Error::Integrity(_)
            | Error::MissingPart(_) => ErrorKind::PackageIntegrity,
        }
    }

    /// Only normalizer transport failures, timeouts and server-side (5xx) answers are
    /// worth another attempt. Everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder() && !e.is_status(),
            Error::NormalizerTimeout(_) => true,
            Error::Normalizer { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
