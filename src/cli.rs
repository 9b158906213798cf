use crate::attachment::Attachment;
use crate::classifier::{ContentType, classify};
use crate::config::Config;
use crate::log_debug;
use crate::schema::{self, quiz_question_count};
use crate::server;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand, crate_version};
use colored::Colorize;
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "lessonsmith-debug.log";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    author,
    version = crate_version!(),
    about = "Lessonsmith: schema-constrained teaching material generation",
    long_about = "Lessonsmith classifies teaching requests, asks Gemini for schema-constrained JSON, and serves the results over HTTP.",
    styles = get_styles(),
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a config file instead of the default location
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log debug messages to a file
    #[arg(short = 'l', long = "log", global = true)]
    pub log: bool,

    /// Custom log file path
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<String>,

    /// Include HTTP client and runtime logs
    #[arg(long = "verbose", global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs", global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate structured content once and print it as JSON
    Generate {
        prompt: String,

        /// File to attach to the request
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Media type of the attached file; guessed from the extension when omitted
        #[arg(long = "media-type", requires = "file")]
        media_type: Option<String>,
    },

    /// Generate an image and write it to disk
    Image {
        prompt: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show how a prompt would be classified, without calling the model
    Classify { prompt: String },
}

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Magenta.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
        .valid(AnsiColor::Blue.on_default().bold())
        .invalid(AnsiColor::Red.on_default().bold())
        .error(AnsiColor::Red.on_default().bold())
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Parse arguments, set up logging, and run the chosen command
pub async fn main() -> Result<()> {
    let cli = parse_args();
    configure_logging(&cli)?;

    if let Commands::Classify { prompt } = &cli.command {
        handle_classify(prompt);
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    handle_command(cli.command, &mut config).await
}

fn configure_logging(cli: &Cli) -> Result<()> {
    crate::logger::set_json_format(cli.json_logs);
    crate::logger::set_verbose_logging(cli.verbose);
    let serving = matches!(cli.command, Commands::Serve { .. });
    crate::logger::set_log_to_console(serving);

    if cli.log {
        let log_file = cli.log_file.as_deref().unwrap_or(LOG_FILE);
        crate::logger::set_log_file(log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
    }

    crate::logger::init().map_err(|e| anyhow::anyhow!("{e}"))?;
    if cli.log || serving {
        crate::logger::enable_logging();
    } else {
        crate::logger::disable_logging();
    }
    Ok(())
}

pub async fn handle_command(command: Commands, config: &mut Config) -> Result<()> {
    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await
        }
        Commands::Generate {
            prompt,
            file,
            media_type,
        } => handle_generate(config, &prompt, file.as_deref(), media_type).await,
        Commands::Image { prompt, output } => handle_image(config, &prompt, &output).await,
        Commands::Classify { prompt } => {
            handle_classify(&prompt);
            Ok(())
        }
    }
}

async fn handle_generate(
    config: &Config,
    prompt: &str,
    file: Option<&Path>,
    media_type: Option<String>,
) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;

    let attachment = match file {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let media_type = media_type.unwrap_or_else(|| guess_media_type(path).to_string());
            let name = path
                .file_name()
                .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
            log_debug!("Attaching {} as {}", path.display(), media_type);
            Some(Attachment::stage(&config.server.staging_dir(), &bytes, media_type, name).await?)
        }
        None => None,
    };

    let result = orchestrator.generate_once(prompt, attachment).await?;
    eprintln!(
        "{} {}",
        "Generated".green().bold(),
        result.content_type().label().cyan()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_image(config: &Config, prompt: &str, output: &Path) -> Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let image = orchestrator.generate_image(prompt).await?;

    let bytes = STANDARD
        .decode(image.data.as_bytes())
        .context("Image data is not valid base64")?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "{} {} ({}, {} bytes)",
        "Wrote".green().bold(),
        output.display(),
        image.mime_type,
        bytes.len()
    );
    Ok(())
}

fn handle_classify(prompt: &str) {
    let content_type = classify(prompt);
    let resolved = schema::resolve(content_type, prompt);
    println!("{}", content_type.label().cyan().bold());
    println!("{} {}", "schema:".dimmed(), resolved.schema.name);
    if content_type == ContentType::Quiz {
        println!("{} {}", "questions:".dimmed(), quiz_question_count(prompt));
    }
}

/// Media type from a file extension, for CLI attachments
pub fn guess_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_generate_with_attachment() {
        let cli = Cli::try_parse_from([
            "lessonsmith",
            "generate",
            "lesson plan on tides",
            "--file",
            "notes.pdf",
        ])
        .expect("parse");
        match cli.command {
            Commands::Generate { prompt, file, media_type } => {
                assert_eq!(prompt, "lesson plan on tides");
                assert_eq!(file, Some(PathBuf::from("notes.pdf")));
                assert!(media_type.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_guess_media_type() {
        assert_eq!(guess_media_type(Path::new("a.PDF")), "application/pdf");
        assert_eq!(guess_media_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(guess_media_type(Path::new("a")), "application/octet-stream");
    }
}
