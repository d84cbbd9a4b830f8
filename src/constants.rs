// XML namespaces
pub const RELS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const PACKAGE_RELS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

// Relationship types
pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const SLIDE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const SLIDE_LAYOUT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const SLIDE_MASTER_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const NOTES_SLIDE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
pub const COMMENTS_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
#[cfg(test)]
pub const IMAGE_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

// Content types
pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const SLIDE_MASTER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
pub const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// English Metric Units per centimetre.
pub const EMU_PER_CM: i64 = 360_000;

/// Seed for the first `p:sldId` of an empty deck (smallest id PowerPoint accepts).
pub const FIRST_SLIDE_ID: u32 = 256;
/// Seed for master ids when a deck has none (`ST_SlideMasterId` lower bound).
pub const FIRST_MASTER_ID: u32 = 2_147_483_648;

/// Prefix of the `p:cSld/@name` tag set on every slide this crate inserts.
pub const ROLE_TAG_PREFIX: &str = "slide-merger:";

pub fn cm_to_emu(cm: f64) -> i64 {
    (cm * EMU_PER_CM as f64).round() as i64
}
