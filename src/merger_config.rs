use crate::constants::cm_to_emu;
use std::path::PathBuf;
use std::time::Duration;

/// Literal strings the template asset carries, used both as substitution placeholders
/// and as markers when deciding whether a deck already holds a role slide.
#[derive(Debug, Clone)]
pub struct TemplateMarkers {
    pub course_placeholder: String,
    pub lesson_title_placeholder: String,
    pub professor_placeholder: String,
    pub professor_prefix: String,
    pub linkedin_placeholder: String,
    pub copyright_phrase: String,
    pub closing_phrase: String,
    pub page_number_token: String,
}

impl Default for TemplateMarkers {
    fn default() -> Self {
        Self {
            course_placeholder: "NOMEMBA".to_string(),
            lesson_title_placeholder: "Título da aula/disciplina".to_string(),
            professor_placeholder: "Nome do(a) Professor(a)".to_string(),
            professor_prefix: "Prof(a) ".to_string(),
            linkedin_placeholder: "linkedin.perfil.com".to_string(),
            copyright_phrase: "Lei nº 9610/98".to_string(),
            closing_phrase: "Obrigado".to_string(),
            page_number_token: "<número>".to_string(),
        }
    }
}

/// Configuration options for the slide merger.
///
/// Use [`MergerConfig::builder()`] to create a configuration instance.
/// Only the fields that are set on the builder differ from the defaults.
///
/// # Configuration Options
///
/// | Parameter | Type | Default | Description |
/// |-----------|------|---------|-------------|
/// | `template_path` | `PathBuf` | `Templates/Template.pptx` | Branded template deck |
/// | `footer_start_emu` | `i64` | 17.0 cm | Top edge of the footer band |
/// | `normalizer_url` | `Option<String>` | `None` | Normalizer endpoint, skipped when unset |
/// | `normalizer_timeout` | `Duration` | 180 s | Upper bound per normalizer attempt |
/// | `normalizer_attempts` | `u32` | `3` | Attempts before giving up |
/// | `normalizer_backoff` | `Duration` | 500 ms | First retry delay, doubled each time |
/// | `refresh_stale_theme` | `bool` | `true` | Re-insert role slides colored with another theme |
/// | `apply_footer_overlay` | `bool` | `true` | Overlay master footer shapes on crowded slides |
/// | `output_file_prefix` | `String` | `ApresentacaoFinal` | Prefix of the suggested file name |
///
/// # Example
///
/// ```
/// use pptx_slide_merger::MergerConfig;
///
/// let config = MergerConfig::builder()
///     .template_path("Templates/Template.pptx")
///     .footer_start_cm(17.26)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MergerConfig {
    pub template_path: PathBuf,
    pub footer_start_emu: i64,
    pub normalizer_url: Option<String>,
    pub normalizer_timeout: Duration,
    pub normalizer_attempts: u32,
    pub normalizer_backoff: Duration,
    pub refresh_stale_theme: bool,
    pub apply_footer_overlay: bool,
    pub output_file_prefix: String,
    pub markers: TemplateMarkers,
}

const DEFAULT_TEMPLATE_PATH: &str = "Templates/Template.pptx";
const DEFAULT_FOOTER_START_CM: f64 = 17.0;
const DEFAULT_NORMALIZER_TIMEOUT: Duration = Duration::from_secs(180);
const DEFAULT_NORMALIZER_ATTEMPTS: u32 = 3;
const DEFAULT_NORMALIZER_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_OUTPUT_PREFIX: &str = "ApresentacaoFinal";

impl Default for MergerConfig {
    fn default() -> Self {
        MergerConfigBuilder::default().build()
    }
}

impl MergerConfig {
    pub fn builder() -> MergerConfigBuilder {
        MergerConfigBuilder::default()
    }
}

/// Builder for [`MergerConfig`].
///
/// Allows setting individual configuration fields while falling back to defaults for any unspecified values
#[derive(Debug, Default)]
pub struct MergerConfigBuilder {
    template_path: Option<PathBuf>,
    footer_start_emu: Option<i64>,
    normalizer_url: Option<String>,
    normalizer_timeout: Option<Duration>,
    normalizer_attempts: Option<u32>,
    normalizer_backoff: Option<Duration>,
    refresh_stale_theme: Option<bool>,
    apply_footer_overlay: Option<bool>,
    output_file_prefix: Option<String>,
    markers: Option<TemplateMarkers>,
}

impl MergerConfigBuilder {
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn footer_start_emu(mut self, emu: i64) -> Self {
        self.footer_start_emu = Some(emu);
        self
    }

    /// Same as [`footer_start_emu`](Self::footer_start_emu), measured in centimetres from the top edge.
    pub fn footer_start_cm(self, cm: f64) -> Self {
        self.footer_start_emu(cm_to_emu(cm))
    }

    pub fn normalizer_url(mut self, url: impl Into<String>) -> Self {
        self.normalizer_url = Some(url.into());
        self
    }

    pub fn normalizer_timeout(mut self, timeout: Duration) -> Self {
        self.normalizer_timeout = Some(timeout);
        self
    }

    /// Sets the total number of normalizer attempts. Values below one are treated as one.
    pub fn normalizer_attempts(mut self, attempts: u32) -> Self {
        self.normalizer_attempts = Some(attempts);
        self
    }

    pub fn normalizer_backoff(mut self, backoff: Duration) -> Self {
        self.normalizer_backoff = Some(backoff);
        self
    }

    pub fn refresh_stale_theme(mut self, value: bool) -> Self {
        self.refresh_stale_theme = Some(value);
        self
    }

    pub fn apply_footer_overlay(mut self, value: bool) -> Self {
        self.apply_footer_overlay = Some(value);
        self
    }

    pub fn output_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_file_prefix = Some(prefix.into());
        self
    }

    pub fn markers(mut self, markers: TemplateMarkers) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Builds the final [`MergerConfig`] instance, applying default values for any fields that were not set.
    pub fn build(self) -> MergerConfig {
        MergerConfig {
            template_path: self
                .template_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
            footer_start_emu: self
                .footer_start_emu
                .unwrap_or_else(|| cm_to_emu(DEFAULT_FOOTER_START_CM)),
            normalizer_url: self.normalizer_url,
            normalizer_timeout: self.normalizer_timeout.unwrap_or(DEFAULT_NORMALIZER_TIMEOUT),
            normalizer_attempts: self
                .normalizer_attempts
                .unwrap_or(DEFAULT_NORMALIZER_ATTEMPTS)
                .max(1),
            normalizer_backoff: self.normalizer_backoff.unwrap_or(DEFAULT_NORMALIZER_BACKOFF),
            refresh_stale_theme: self.refresh_stale_theme.unwrap_or(true),
            apply_footer_overlay: self.apply_footer_overlay.unwrap_or(true),
            output_file_prefix: self
                .output_file_prefix
                .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
            markers: self.markers.unwrap_or_default(),
        }
    }
}
