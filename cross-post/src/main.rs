//! cross-post - Publish one post to several social networks at once

mod uploader;

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use libcrosscast::logging::{LogFormat, LoggingConfig};
use libcrosscast::{
    BatchReport, Config, Credential, CrosscastError, DestinationId, Dispatcher, MediaItem,
    ObjectStoreUploader, PublishRequest, Result,
};
use serde::Deserialize;

use uploader::{NoObjectStore, ObjectStoreConfig, PutUploader};

#[derive(Parser, Debug)]
#[command(name = "cross-post")]
#[command(about = "Publish a post to multiple social networks at once", long_about = None)]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target destinations, comma-separated (defaults to every destination
    /// present in the credentials file)
    #[arg(short = 't', long = "to")]
    to: Option<String>,

    /// Media to attach: local file paths or https URLs (repeatable)
    #[arg(short, long)]
    media: Vec<String>,

    /// Path to the credentials TOML file
    #[arg(short, long, default_value = "~/.config/crosscast/credentials.toml")]
    credentials: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Credentials file layout: one table per destination, plus an optional
/// object-store section for raw media uploads.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    object_store: Option<ObjectStoreConfig>,
    #[serde(flatten)]
    accounts: HashMap<String, Credential>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "error" };
    LoggingConfig::new(LogFormat::Text, level.to_string(), cli.verbose).init();

    match run(cli).await {
        Ok(report) => {
            if report.all_failed() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<BatchReport> {
    if cli.format != "text" && cli.format != "json" {
        return Err(CrosscastError::InvalidInput(format!(
            "invalid output format '{}'. Valid options: text, json",
            cli.format
        )));
    }

    let config = Config::load()?;
    let credentials_file = load_credentials(&cli.credentials)?;

    let mut credentials: HashMap<DestinationId, Credential> = HashMap::new();
    for (name, credential) in credentials_file.accounts {
        match name.parse::<DestinationId>() {
            Ok(id) => {
                credentials.insert(id, credential);
            }
            Err(_) => {
                tracing::warn!("ignoring unknown destination '{}' in credentials file", name)
            }
        }
    }

    let destinations: Vec<DestinationId> = match &cli.to {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().parse())
            .collect::<Result<_>>()?,
        None => DestinationId::ALL
            .iter()
            .copied()
            .filter(|d| credentials.contains_key(d))
            .collect(),
    };

    let media = cli
        .media
        .iter()
        .map(|spec| load_media(spec))
        .collect::<Result<Vec<_>>>()?;

    let content = match cli.content {
        Some(content) => Some(content),
        None if media.is_empty() => read_stdin()?,
        None => None,
    };

    let uploader: Arc<dyn ObjectStoreUploader> = match credentials_file.object_store {
        Some(store) => Arc::new(PutUploader::new(store)?),
        None => Arc::new(NoObjectStore),
    };

    let dispatcher = Dispatcher::from_config(&config, uploader)?;
    let request = PublishRequest::new(content, media, destinations, credentials);
    let report = dispatcher.publish_many(&request).await?;

    print_report(&report, &cli.format)?;
    Ok(report)
}

fn load_credentials(path: &str) -> Result<CredentialsFile> {
    let expanded = shellexpand::tilde(path).to_string();
    let raw = std::fs::read_to_string(&expanded).map_err(|e| {
        CrosscastError::InvalidInput(format!("cannot read credentials file {}: {}", expanded, e))
    })?;
    toml::from_str(&raw)
        .map_err(|e| CrosscastError::InvalidInput(format!("malformed credentials file: {}", e)))
}

/// A media argument is either an https URL (passed through) or a local file
/// (read into bytes, MIME type derived from the extension).
fn load_media(spec: &str) -> Result<MediaItem> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return Ok(MediaItem::from_url(spec));
    }

    let data = std::fs::read(spec)
        .map_err(|e| CrosscastError::InvalidInput(format!("cannot read media file {}: {}", spec, e)))?;
    let mime_type = mime_for_path(spec)?;
    Ok(MediaItem::from_bytes(data, mime_type)?)
}

fn mime_for_path(path: &str) -> Result<&'static str> {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        "mp4" | "m4v" => Ok("video/mp4"),
        "mov" => Ok("video/quicktime"),
        "webm" => Ok("video/webm"),
        _ => Err(CrosscastError::InvalidInput(format!(
            "cannot determine media type of '{}'; supported: jpg, jpeg, png, gif, webp, mp4, m4v, mov, webm",
            path
        ))),
    }
}

fn read_stdin() -> Result<Option<String>> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| CrosscastError::InvalidInput(format!("failed to read stdin: {}", e)))?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn print_report(report: &BatchReport, format: &str) -> Result<()> {
    if format == "json" {
        let json = serde_json::to_string_pretty(report).map_err(|e| {
            CrosscastError::InvalidInput(format!("failed to serialize report: {}", e))
        })?;
        println!("{}", json);
        return Ok(());
    }

    for result in &report.results {
        match (&result.post_id, &result.error) {
            (Some(post_id), _) => println!("{}: ok ({})", result.destination, post_id),
            (None, Some(error)) => println!("{}: failed ({})", result.destination, error),
            (None, None) => println!("{}: failed", result.destination),
        }
    }
    println!(
        "{} of {} destinations succeeded",
        report.success_count,
        report.results.len()
    );
    Ok(())
}
