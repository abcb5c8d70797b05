//! fetch-unzip - download a ZIP archive, unpack it and step into it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use fetch_unzip::{
    CommandExtractor, Extractor, HttpFetcher, InstallPipeline, InstallRequest, PipelineError,
    ZipExtractor, DEFAULT_ARCHIVE_NAME, DEFAULT_EXTRACT_DIR, DEFAULT_URL,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExtractorKind {
    /// Built-in ZIP reader
    Zip,
    /// External `unzip` executable found on PATH
    Unzip,
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// URL of the ZIP archive
    #[arg(long, env = "FETCH_UNZIP_URL", default_value = DEFAULT_URL)]
    url: String,

    /// File name the archive is saved as, inside the workdir
    #[arg(long, env = "FETCH_UNZIP_ARCHIVE", default_value = DEFAULT_ARCHIVE_NAME)]
    archive: String,

    /// Folder the archive unpacks into, relative to the workdir
    #[arg(long, env = "FETCH_UNZIP_DIR", default_value = DEFAULT_EXTRACT_DIR)]
    dir: PathBuf,

    /// Directory to download and extract in
    #[arg(long, env = "FETCH_UNZIP_WORKDIR", default_value = ".")]
    workdir: PathBuf,

    #[arg(long, env = "FETCH_UNZIP_EXTRACTOR", value_enum, default_value_t = ExtractorKind::Zip)]
    extractor: ExtractorKind,

    /// Write the response body even when the server reports an error status
    #[arg(long)]
    no_status_check: bool,

    /// Per-stage timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the install outcome as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.extractor {
        ExtractorKind::Zip => run(&cli, ZipExtractor::new()).await,
        ExtractorKind::Unzip => run(&cli, CommandExtractor::new()).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Install failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run<E>(cli: &Cli, extractor: E) -> Result<(), RunError>
where
    E: Extractor + 'static,
{
    let request = InstallRequest::default()
        .with_url(cli.url.as_str())
        .with_workdir(&cli.workdir)
        .with_archive_name(cli.archive.as_str())
        .with_extract_dir(&cli.dir);

    let fetcher = HttpFetcher::new()
        .map_err(PipelineError::from)?
        .with_status_check(!cli.no_status_check);

    let mut pipeline = InstallPipeline::new(fetcher, extractor);
    if let Some(secs) = cli.timeout {
        pipeline = pipeline.with_timeout(Duration::from_secs(secs));
    }

    let outcome = pipeline.execute(&request).await?;

    if let Some(output) = &outcome.extraction.tool_output {
        print!("{}", output);
    }

    outcome.enter().map_err(|source| RunError::Enter {
        path: outcome.extracted_dir.clone(),
        source,
    })?;
    // `extracted_dir` may be relative to the directory just left.
    let cwd = std::env::current_dir().map_err(|source| RunError::Enter {
        path: outcome.extracted_dir.clone(),
        source,
    })?;
    tracing::info!(cwd = %cwd.display(), "Entered extracted directory");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", cwd.display());
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
enum RunError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to enter {}: {source}", .path.display())]
    Enter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode outcome: {0}")]
    Json(#[from] serde_json::Error),
}
