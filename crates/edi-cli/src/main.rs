#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # edi
//!
//! Parse, validate and convert EDI interchanges against a template file.
//!
//! Exit codes: 0 on success, 1 when the document has errors, 2 for usage
//! errors and 3 when the run cannot complete (unreadable files, a bad
//! template or configuration).

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::EngineConfig;
use edi_dialect::Dialect;
use edi_ir::DocumentErrors;
use edi_parser::{ParseOutcome, Parser as DocumentParser};
use edi_schema::{TemplateLoader, TemplateTree};
use edi_serializer::{EdiWriter, OutputFormat, WriterConfig};
use edi_validation::{ReportFormat, StrictnessLevel, ValidationEngine, ValidationReporter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edi")]
#[command(about = "Template-driven EDI parser, validator and converter")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a document
#[derive(clap::Args)]
struct InputArgs {
    /// Input file path
    input: PathBuf,

    /// Template file path (YAML or JSON)
    #[arg(short, long)]
    template: PathBuf,

    /// Input dialect; detected from the first bytes when omitted
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Strip surrounding spaces from field values
    #[arg(long)]
    trim: bool,

    /// Stop recording errors after this many
    #[arg(long)]
    max_errors: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document and print its tree and parse errors
    Parse {
        #[command(flatten)]
        input: InputArgs,

        /// Error report format
        #[arg(short, long)]
        format: Option<ReportFormat>,
    },

    /// Parse and validate a document; exits 1 when it is invalid
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Which severities fail the document
        #[arg(short, long, value_enum)]
        strictness: Option<Strictness>,

        /// Error report format
        #[arg(short, long)]
        format: Option<ReportFormat>,
    },

    /// Re-serialize a document in another format
    Convert {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(long)]
        to: OutputFormat,

        /// Output file path; standard output when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Newline after every segment or record
        #[arg(long)]
        line_breaks: bool,

        /// Prefix EDIFACT output with a UNA segment
        #[arg(long)]
        una: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Strictness {
    Strict,
    Moderate,
    Lenient,
}

impl From<Strictness> for StrictnessLevel {
    fn from(strictness: Strictness) -> Self {
        match strictness {
            Strictness::Strict => StrictnessLevel::Strict,
            Strictness::Moderate => StrictnessLevel::Moderate,
            Strictness::Lenient => StrictnessLevel::Lenient,
        }
    }
}

/// Result of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Clean,
    Findings,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Clean => ExitCode::SUCCESS,
            Status::Findings => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<Status> {
    let mut config = EngineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { input, format } => {
            let format = format.unwrap_or(config.report);
            let Some(outcome) = load_and_parse(&input, &mut config, format)? else {
                return Ok(Status::Findings);
            };
            print!("{}", outcome.document.outline());
            if !outcome.errors.is_empty() {
                print_report(format, &outcome.errors)?;
            }
            eprintln!(
                "Parse summary: dialect={}, segments={}, skipped={}, errors={}",
                outcome.dialect,
                outcome.segments,
                outcome.skipped,
                outcome.errors.len()
            );
            Ok(Status::Clean)
        }
        Commands::Validate {
            input,
            strictness,
            format,
        } => {
            if let Some(strictness) = strictness {
                config.validation.strictness = strictness.into();
            }
            let format = format.unwrap_or(config.report);
            let Some(outcome) = load_and_parse(&input, &mut config, format)? else {
                return Ok(Status::Findings);
            };

            let engine = ValidationEngine::with_config(config.validation.clone());
            let result = engine.check_parsed(&outcome);
            if result.has_errors() {
                print_report(format, &result.errors)?;
            }
            if result.has_warnings() {
                println!("Warnings:");
                print_report(format, &result.warnings)?;
            }
            eprintln!(
                "Validation summary: valid={}, errors={}, warnings={}",
                result.is_valid,
                result.errors.len(),
                result.warnings.len()
            );
            Ok(if result.is_valid {
                Status::Clean
            } else {
                Status::Findings
            })
        }
        Commands::Convert {
            input,
            to,
            output,
            line_breaks,
            una,
        } => {
            let format = config.report;
            let Some(outcome) = load_and_parse(&input, &mut config, format)? else {
                return Ok(Status::Findings);
            };
            if !outcome.errors.is_empty() {
                warn!(
                    errors = outcome.errors.len(),
                    "Converting a document that did not parse cleanly"
                );
            }

            let mut writer = config.writer.clone();
            writer.line_breaks |= line_breaks;
            writer.emit_una |= una;
            let text = convert(&outcome, to, writer, &config).await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(format = %to, path = %path.display(), bytes = text.len(), "Wrote output");
                }
                None => print!("{text}"),
            }
            Ok(Status::Clean)
        }
    }
}

/// Load the template and parse the input, applying the input flags to
/// `config.parser`
///
/// A parse rejected by the `surface` error policy prints its report and
/// yields `None`.
fn load_and_parse(
    args: &InputArgs,
    config: &mut EngineConfig,
    format: ReportFormat,
) -> Result<Option<ParseOutcome>> {
    if args.trim {
        config.parser.trim_whitespace = true;
    }
    if let Some(max_errors) = args.max_errors {
        config.parser.max_errors = max_errors;
    }

    let template = load_template(&args.template)?;
    let input = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;
    let parser = DocumentParser::new(template).with_config(config.parser);
    let parsed = match args.dialect {
        Some(dialect) => parser.parse_bytes(dialect, &input),
        None => parser.parse_detected(&input),
    };

    match parsed {
        Ok(outcome) => {
            debug!(dialect = %outcome.dialect, segments = outcome.segments, "Parsed input");
            Ok(Some(outcome))
        }
        Err(e) => {
            if let Some(errors) = e.errors() {
                print_report(format, errors)?;
                eprintln!("Parse rejected: {e}");
                return Ok(None);
            }
            Err(e).with_context(|| format!("Failed to parse {}", args.input.display()))
        }
    }
}

fn load_template(path: &Path) -> Result<Arc<TemplateTree>> {
    TemplateLoader::new()
        .load_file(path)
        .with_context(|| format!("Failed to load template {}", path.display()))
}

async fn convert(
    outcome: &ParseOutcome,
    to: OutputFormat,
    mut writer: WriterConfig,
    config: &EngineConfig,
) -> Result<String> {
    let doc = &outcome.document;
    match to {
        OutputFormat::X12 | OutputFormat::Edifact | OutputFormat::Tradacoms => {
            if let Some(dialect) = to.dialect() {
                writer.dialect = dialect;
            }
            Ok(EdiWriter::new(writer).write_piped(doc).await?)
        }
        OutputFormat::ValidatingXml => {
            let engine = ValidationEngine::with_config(config.validation.clone());
            let result = engine.check_parsed(outcome);
            let mut errors = result.errors;
            errors.extend(result.warnings.into_vec());
            Ok(edi_serializer::serialize(doc, to, &writer, &errors)?)
        }
        _ => Ok(edi_serializer::serialize(
            doc,
            to,
            &writer,
            &DocumentErrors::new(),
        )?),
    }
}

fn print_report(format: ReportFormat, errors: &DocumentErrors) -> Result<()> {
    let report = ValidationReporter::new().render(format, errors)?;
    println!("{}", report.trim_end());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_arguments() {
        let cli = Cli::try_parse_from([
            "edi", "convert", "in.edi", "-t", "t.yaml", "--to", "validating-xml", "-d", "x12",
        ])
        .unwrap();
        let Commands::Convert { input, to, .. } = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(to, OutputFormat::ValidatingXml);
        assert_eq!(input.dialect, Some(Dialect::X12));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["edi", "convert", "in.edi", "-t", "t.yaml", "--to", "pdf"]).is_err());
    }
}
