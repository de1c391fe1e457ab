//! mediarig - command-line front end
//!
//! Wires the orchestrators to a configuration, renders job progress and turns
//! failures into one of three messages: tool missing, failed, or cancelled.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediarig::cli::{Args, Commands};
use mediarig::config::Config;
use mediarig::error::{FailureCategory, RigError};
use mediarig::media::ConversionRequest;
use mediarig::process::until_cancelled;
use mediarig::retrieval::RetrievalRequest;
use mediarig::tags::{MediaTags, TagField};
use mediarig::workflow::Workflow;

const DEFAULT_CONFIG: &str = "mediarig.toml";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = setup_logging(args.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(args).await {
        std::process::exit(report_failure(&e));
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let cancel = install_cancellation(args.timeout);
    let workflow = Workflow::new(config, args.verbose)?;

    match args.command {
        Commands::Tools => {
            let set = workflow.locator().snapshot();
            println!("\nExternal tools:");
            println!("{:<12} {:<10} {}", "Tool", "Status", "Path");
            println!("{}", "-".repeat(70));
            for status in &set.tools {
                let state = if status.available { "found" } else { "missing" };
                println!("{:<12} {:<10} {}", status.kind, state, status.path.display());
            }
        }
        Commands::Convert {
            input,
            format,
            output_dir,
            image,
            resolution,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| parent_dir(&input));
            let mut request = ConversionRequest::new(&input, format, output_dir);
            if let Some(image) = image {
                request = request.with_still_image(image);
            }
            if let Some(resolution) = resolution {
                request = request.with_resolution(resolution);
            }

            let output = workflow
                .convert(&request, cancel)
                .await
                .map_err(|e| with_partial_output(e, &request.output_path()))?;
            println!("Converted: {}", output.display());
        }
        Commands::Batch {
            input_dir,
            format,
            output_dir,
            image,
        } => {
            let summary = workflow
                .batch_convert(
                    &input_dir,
                    &format,
                    output_dir.as_deref(),
                    image.as_deref(),
                    cancel,
                )
                .await?;

            println!(
                "\nConverted {} file(s), {} failed",
                summary.converted.len(),
                summary.failed.len()
            );
            for (path, reason) in &summary.failed {
                println!("  {}: {}", path.display(), reason);
            }
        }
        Commands::Download {
            url,
            format,
            output_dir,
            no_metadata,
        } => {
            let request = RetrievalRequest::new(&url, &format, !no_metadata, output_dir)?;
            let (observer, display) = workflow.display(request.format.token());
            let result = workflow.retriever().download(&request, observer, cancel).await;
            display.finish().await;
            result.map_err(|e| with_partial_output(e, &request.output_dir))?;
            println!("Downloaded into {}", request.output_dir.display());
        }
        Commands::Probe { url, thumbnail } => {
            let Some(meta) = until_cancelled(&cancel, workflow.retriever().probe(&url)).await? else {
                println!("No metadata found for {}", url);
                return Ok(());
            };

            println!("{:<10} {}", "Title", meta.title);
            println!("{:<10} {}", "Duration", meta.duration);
            println!("{:<10} {}", "Uploader", meta.uploader.as_deref().unwrap_or("-"));
            println!("{:<10} {}", "Thumbnail", meta.thumbnail_url);

            if let Some(dest) = thumbnail {
                // A thumbnail is a nicety; the probe itself succeeded.
                let fetch = workflow.retriever().fetch_thumbnail(&meta.thumbnail_url, &dest);
                match until_cancelled(&cancel, fetch).await? {
                    Ok(path) => println!("Thumbnail saved to {}", path.display()),
                    Err(e) => warn!("Thumbnail unavailable: {}", e),
                }
            }
        }
        Commands::Tags { input } => {
            let sections = until_cancelled(&cancel, workflow.tag_reader().read(&input)).await??;
            for section in &sections {
                println!("\n[{}]", section.title);
                for item in &section.items {
                    println!("  {:<32} {}", item.key, item.value);
                }
            }
            println!("\nSummary:");
            print_tags(&MediaTags::from_sections(&sections));
        }
        Commands::Inspect { input } => {
            let tags = until_cancelled(&cancel, workflow.converter().inspect_tags(&input)).await??;
            print_tags(&tags);
        }
        Commands::ProbeFile { input } => {
            let data = until_cancelled(&cancel, workflow.converter().probe_data(&input)).await??;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Cover { input, output } => {
            let (observer, display) = workflow.display("cover");
            let result = workflow
                .converter()
                .extract_cover_art(&input, &output, observer, cancel)
                .await;
            display.finish().await;
            result?;
            println!("Cover art saved to {}", output.display());
        }
        Commands::Retag {
            input,
            title,
            artist,
            album,
            year,
            genre,
            comment,
            cover,
        } => {
            let tags = MediaTags {
                title,
                artist,
                album,
                year,
                genre,
                comment,
            };
            if tags.is_empty() && cover.is_none() {
                return Err(RigError::InvalidRequest("nothing to write".to_string()).into());
            }

            let (observer, display) = workflow.display("retag");
            let result = workflow
                .converter()
                .write_tags(&input, &tags, cover.as_deref(), observer, cancel)
                .await;
            display.finish().await;
            result?;
            println!("Updated tags of {}", input.display());
        }
        Commands::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG);
                Config::from_file(DEFAULT_CONFIG)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

/// One token for the whole invocation, fired by Ctrl-C or the deadline.
fn install_cancellation(timeout: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    if let Some(secs) = timeout {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Timed out after {}s, cancelling", secs);
            on_deadline.cancel();
        });
    }

    cancel
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Attach the location of possibly incomplete output to cancellations and
/// failures; the file is left for the user to keep or remove.
fn with_partial_output(e: RigError, location: &Path) -> anyhow::Error {
    match e.category() {
        FailureCategory::ToolMissing => e.into(),
        _ => anyhow::Error::new(e).context(format!(
            "incomplete output may remain at {}",
            location.display()
        )),
    }
}

fn print_tags(tags: &MediaTags) {
    for field in TagField::ALL {
        println!("  {:<10} {}", field.label(), tags.get(field).unwrap_or("-"));
    }
}

/// Print the message for the failure's category and return the exit code.
fn report_failure(e: &anyhow::Error) -> i32 {
    let category = e
        .chain()
        .find_map(|cause| cause.downcast_ref::<RigError>())
        .map(RigError::category);

    match category {
        Some(FailureCategory::ToolMissing) => {
            eprintln!("Required tool is not installed: {:#}", e);
            eprintln!("Run `mediarig tools` to see where tools are looked up.");
            3
        }
        Some(FailureCategory::Cancelled) => {
            eprintln!("Cancelled: {:#}", e);
            130
        }
        _ => {
            eprintln!("Operation failed: {:#}", e);
            1
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".mediarig").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "mediarig.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("mediarig.log").display()
    );

    Ok(())
}
