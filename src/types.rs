use crate::{Error, ErrorKind, Result};
use std::fmt;

/// Course-specific values substituted into the template slides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub course_name: String,
    /// Hex color with or without a leading `#`.
    pub theme_color: String,
    pub lesson_title: String,
    pub professor_name: String,
    pub linkedin_handle: String,
}

impl MergeRequest {
    /// Checks that every field is present and that the theme is a 6-digit hex color.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("course name", &self.course_name),
            ("theme color", &self.theme_color),
            ("lesson title", &self.lesson_title),
            ("professor name", &self.professor_name),
            ("LinkedIn handle", &self.linkedin_handle),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{} is required", label)));
            }
        }

        let hex = self.theme_hex();
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!(
                "theme color '{}' is not a 6-digit hex color",
                self.theme_color
            )));
        }
        Ok(())
    }

    /// Theme color as written into `a:srgbClr/@val`: no `#`, upper case.
    pub fn theme_hex(&self) -> String {
        normalize_hex(&self.theme_color)
    }
}

pub fn normalize_hex(color: &str) -> String {
    color.trim().trim_start_matches('#').to_ascii_uppercase()
}

/// A presentation file as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedDeck {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Outcome of [`SlideMerger::merge`](crate::SlideMerger::merge).
#[derive(Debug)]
pub enum MergeResponse {
    Success {
        bytes: Vec<u8>,
        file_name: String,
        message: String,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl MergeResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, MergeResponse::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            MergeResponse::Success { message, .. } | MergeResponse::Failure { message, .. } => {
                message
            }
        }
    }
}

/// Fixed structural slots the template fills in a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideRole {
    Cover,
    Copyright,
    Closing,
}

impl SlideRole {
    pub fn tag(self) -> &'static str {
        match self {
            SlideRole::Cover => "cover",
            SlideRole::Copyright => "copyright",
            SlideRole::Closing => "closing",
        }
    }
}

impl fmt::Display for SlideRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Offset and extents of a drawable, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Transform {
    /// Bottom edge (`y + cy`).
    pub fn y_end(&self) -> i64 {
        self.y + self.cy
    }
}
