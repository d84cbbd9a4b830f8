use clap::Parser;
use pptx_slide_merger::{
    MergeRequest, MergeResponse, MergerConfig, SlideMerger, UploadedDeck, PPTX_CONTENT_TYPE,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Adds the branded cover, copyright and closing slides to a presentation.
#[derive(Debug, Parser)]
#[command(name = "slide-merger", version)]
struct Cli {
    /// Presentation to brand
    input: PathBuf,

    /// Branded template deck
    #[arg(long, default_value = "Templates/Template.pptx")]
    template: PathBuf,

    #[arg(long)]
    course: String,

    /// Theme color as hex, with or without '#'
    #[arg(long)]
    theme: String,

    /// Lesson title
    #[arg(long)]
    title: String,

    #[arg(long)]
    professor: String,

    /// LinkedIn handle of the professor
    #[arg(long)]
    linkedin: String,

    /// Where to write the result (defaults to the suggested file name)
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long)]
    normalizer_url: Option<String>,

    /// Top edge of the footer band, in cm
    #[arg(long, default_value_t = 17.0)]
    footer_cm: f64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pptx_slide_merger=info,slide_merger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut builder = MergerConfig::builder()
        .template_path(&cli.template)
        .footer_start_cm(cli.footer_cm);
    if let Some(url) = &cli.normalizer_url {
        builder = builder.normalizer_url(url);
    }

    let merger = match SlideMerger::new(builder.build()) {
        Ok(merger) => merger,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let bytes = match tokio::fs::read(&cli.input).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("cannot read {}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let upload = UploadedDeck {
        file_name: cli
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: Some(PPTX_CONTENT_TYPE.to_string()),
        bytes,
    };
    let request = MergeRequest {
        course_name: cli.course,
        theme_color: cli.theme,
        lesson_title: cli.title,
        professor_name: cli.professor,
        linkedin_handle: cli.linkedin,
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match merger.merge(&upload, &request, &cancel).await {
        MergeResponse::Success { bytes, file_name, message } => {
            let target = cli.output.unwrap_or_else(|| PathBuf::from(file_name));
            if let Err(e) = tokio::fs::write(&target, bytes).await {
                eprintln!("cannot write {}: {}", target.display(), e);
                return ExitCode::FAILURE;
            }
            println!("{} -> {}", message, target.display());
            ExitCode::SUCCESS
        }
        MergeResponse::Failure { kind, message } => {
            eprintln!("{:?}: {}", kind, message);
            ExitCode::FAILURE
        }
    }
}
