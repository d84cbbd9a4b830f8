use crate::assembler::{AssemblyReport, DeckAssembler};
use crate::constants::PPTX_CONTENT_TYPE;
use crate::deck::Deck;
use crate::merger_config::MergerConfig;
use crate::normalizer::NormalizerClient;
use crate::package::Package;
use crate::types::{MergeRequest, MergeResponse, UploadedDeck};
use crate::{Error, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const SUCCESS_MESSAGE: &str = "Slides processados com sucesso!";
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// Entry point of a merge: validates the upload, runs the assembly on a private
/// temporary copy and hands the result to the normalizer.
///
/// Every failure is turned into [`MergeResponse::Failure`]; nothing propagates to the
/// caller. Temporary files live in a [`tempfile::TempDir`] that is removed on every
/// exit path.
#[derive(Debug, Clone)]
pub struct SlideMerger {
    config: MergerConfig,
    normalizer: Option<NormalizerClient>,
}

impl SlideMerger {
    pub fn new(config: MergerConfig) -> Result<Self> {
        let normalizer = NormalizerClient::from_config(&config)?;
        Ok(Self { config, normalizer })
    }

    pub fn config(&self) -> &MergerConfig {
        &self.config
    }

    pub async fn merge(
        &self,
        upload: &UploadedDeck,
        request: &MergeRequest,
        cancel: &CancellationToken,
    ) -> MergeResponse {
        match self.try_merge(upload, request, cancel).await {
            Ok((bytes, file_name)) => MergeResponse::Success {
                bytes,
                file_name,
                message: SUCCESS_MESSAGE.to_string(),
            },
            Err(e) => {
                tracing::error!(kind = ?e.kind(), error = %e, file = %upload.file_name, "merge failed");
                MergeResponse::Failure { kind: e.kind(), message: e.to_string() }
            }
        }
    }

    async fn try_merge(
        &self,
        upload: &UploadedDeck,
        request: &MergeRequest,
        cancel: &CancellationToken,
    ) -> Result<(Vec<u8>, String)> {
        validate_upload(upload)?;
        request.validate()?;

        let workdir = tempfile::Builder::new().prefix("slide-merger-").tempdir()?;
        let input_path = workdir.path().join("input.pptx");
        let output_path = workdir.path().join("output.pptx");
        tokio::fs::write(&input_path, &upload.bytes).await?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let config = self.config.clone();
        let owned_request = request.clone();
        let (input, output) = (input_path.clone(), output_path.clone());
        let report = tokio::task::spawn_blocking(move || {
            assemble_file(&config, &owned_request, &input, &output)
        })
        .await
        .map_err(|e| Error::Integrity(format!("assembly task failed: {}", e)))??;

        tracing::info!(
            file = %upload.file_name,
            inserted = ?report.inserted,
            skipped = ?report.skipped,
            "merged deck saved"
        );

        let bytes = tokio::fs::read(&output_path).await?;
        let file_name = output_file_name(&self.config.output_file_prefix);

        let bytes = match &self.normalizer {
            Some(normalizer) => normalizer.normalize(&file_name, &bytes, cancel).await?,
            None => bytes,
        };

        Ok((bytes, file_name))
    }
}

/// Opens both packages, assembles and saves. The destination package is dropped before
/// returning.
fn assemble_file(
    config: &MergerConfig,
    request: &MergeRequest,
    input: &Path,
    output: &Path,
) -> Result<AssemblyReport> {
    let template = Package::open(&config.template_path).map_err(|e| {
        Error::Template(format!(
            "cannot open template {}: {}",
            config.template_path.display(),
            e
        ))
    })?;
    let mut deck = Deck::open(Package::open(input)?)?;
    let report = DeckAssembler::new(config, &template)?.assemble(&mut deck, request)?;
    deck.into_package().save(output)?;
    Ok(report)
}

fn validate_upload(upload: &UploadedDeck) -> Result<()> {
    if upload.bytes.is_empty() {
        return Err(Error::Validation("no presentation file was sent".to_string()));
    }

    let is_pptx = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pptx"))
        .unwrap_or(false);
    if !is_pptx {
        return Err(Error::Validation(format!(
            "'{}' is not a .pptx file",
            upload.file_name
        )));
    }

    if let Some(content_type) = upload.content_type.as_deref() {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence != PPTX_CONTENT_TYPE && essence != GENERIC_CONTENT_TYPE {
            return Err(Error::Validation(format!(
                "content type '{}' is not a presentation",
                content_type
            )));
        }
    }
    Ok(())
}

fn output_file_name(prefix: &str) -> String {
    format!("{}_{}.pptx", prefix, chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn upload(name: &str, content_type: Option<&str>) -> UploadedDeck {
        UploadedDeck {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            bytes: vec![0x50, 0x4b, 0x03, 0x04],
        }
    }

    fn request() -> MergeRequest {
        MergeRequest {
            course_name: "Data Science".into(),
            theme_color: "#8245a4".into(),
            lesson_title: "Intro to ML".into(),
            professor_name: "Jane Doe".into(),
            linkedin_handle: "linkedin.com/in/janedoe".into(),
        }
    }

    #[test]
    fn test_upload_validation() {
        assert!(validate_upload(&upload("aula.PPTX", Some(PPTX_CONTENT_TYPE))).is_ok());
        assert!(validate_upload(&upload("aula.pptx", Some(GENERIC_CONTENT_TYPE))).is_ok());
        assert!(validate_upload(&upload("aula.pptx", None)).is_ok());
        assert!(validate_upload(&upload("aula.ppt", None)).is_err());
        assert!(validate_upload(&upload("aula.pptx", Some("application/pdf"))).is_err());

        let mut empty = upload("aula.pptx", None);
        empty.bytes.clear();
        assert!(validate_upload(&empty).is_err());
    }

    #[test]
    fn test_output_file_name_shape() {
        let name = output_file_name("ApresentacaoFinal");
        assert!(name.starts_with("ApresentacaoFinal_"));
        assert!(name.ends_with(".pptx"));
        // prefix + '_' + yyyyMMdd_HHmmss + ".pptx"
        assert_eq!(name.len(), "ApresentacaoFinal_".len() + 15 + 5);
    }

    #[tokio::test]
    async fn test_invalid_upload_is_reported_not_raised() {
        let merger = SlideMerger::new(MergerConfig::default()).unwrap();
        let response = merger
            .merge(&upload("aula.key", None), &request(), &CancellationToken::new())
            .await;
        match response {
            MergeResponse::Failure { kind, .. } => assert_eq!(kind, ErrorKind::Validation),
            other => panic!("expected failure, got {:?}", other.message()),
        }
    }

    #[tokio::test]
    async fn test_missing_template_is_a_template_error() {
        let config = MergerConfig::builder()
            .template_path("does/not/exist/Template.pptx")
            .build();
        let merger = SlideMerger::new(config).unwrap();
        let response = merger
            .merge(&upload("aula.pptx", None), &request(), &CancellationToken::new())
            .await;
        match response {
            MergeResponse::Failure { kind, .. } => assert_eq!(kind, ErrorKind::Template),
            other => panic!("expected failure, got {:?}", other.message()),
        }
    }
}
