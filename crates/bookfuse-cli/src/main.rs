mod logging;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use bookfuse_core::{AppConfig, CatalogError, ExitCode};
use bookfuse_resolve::identifiers::{Isbn, strip_isbn, validate_isbn10, validate_isbn13};
use bookfuse_resolve::{Pipeline, ResolveError, RunOptions, RunOutcome};
use logging::{LogConfig, LogFormat, init_logging};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "bookfuse",
    about = "Reconcile scraped and API book metadata into one canonical catalog",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting BOOKFUSE_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the standard location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation pipeline over the landing files.
    Run {
        /// Landing directory holding both source files.
        #[arg(long, value_name = "DIR")]
        landing: Option<PathBuf>,
        /// Catalog-scrape file, relative to the landing directory.
        #[arg(long, value_name = "FILE")]
        scrape: Option<PathBuf>,
        /// Bibliographic-API file, relative to the landing directory.
        #[arg(long, value_name = "FILE")]
        api: Option<PathBuf>,
        /// Output root; tables go to <DIR>/standard and docs to <DIR>/docs.
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Reconcile and check without writing artifacts.
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate ISBNs and show their ISBN-13 / ISBN-10 forms.
    Isbn {
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective config.
    Show,
    /// Print the config file path.
    Path,
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("BOOKFUSE_JSON").as_deref() == Ok("1");

    let code = match run(cli, json_output) {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            error!(error = %format!("{err:#}"), "bookfuse failed");
            if json_output {
                let body = serde_json::json!({
                    "status": "error",
                    "error": error_kind(code),
                    "message": format!("{err:#}"),
                });
                println!("{body}");
            } else {
                eprintln!("error: {err:#}");
            }
            code
        }
    };

    std::process::exit(code as i32);
}

fn run(cli: Cli, json_output: bool) -> Result<ExitCode> {
    let start = Instant::now();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let log_config = LogConfig::from_settings(&config.logging)
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format);
    init_logging(&log_config).context("initializing logging")?;

    match cli.command {
        // ── Run ────────────────────────────────────────────────────────────
        Commands::Run {
            landing,
            scrape,
            api,
            out,
            dry_run,
        } => {
            if let Some(dir) = landing {
                config.paths.landing_dir = dir.to_string_lossy().to_string();
            }
            if let Some(file) = scrape {
                config.paths.scrape_file = file.to_string_lossy().to_string();
            }
            if let Some(file) = api {
                config.paths.api_file = file.to_string_lossy().to_string();
            }
            if let Some(root) = out {
                config.set_output_root(&root);
            }

            let pipeline = Pipeline::from_config(&config)?;
            let outcome = pipeline.run(&config, RunOptions { dry_run })?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": run_summary(&outcome),
                    "meta": { "duration_ms": dur, "dry_run": dry_run }
                }))?;
            } else {
                print_run_summary(&outcome, dur);
            }
            Ok(ExitCode::Success)
        }

        // ── Isbn ───────────────────────────────────────────────────────────
        Commands::Isbn { values } => {
            let results: Vec<serde_json::Value> = values.iter().map(|v| isbn_report(v)).collect();
            let all_valid = results.iter().all(|r| r["valid"] == true);

            if json_output {
                print_json(&serde_json::json!({
                    "status": if all_valid { "ok" } else { "invalid" },
                    "data": results,
                }))?;
            } else {
                for result in &results {
                    if result["valid"] == true {
                        println!(
                            "{input}  valid  isbn13={isbn13}  isbn10={isbn10}  {formatted}",
                            input = result["input"].as_str().unwrap_or_default(),
                            isbn13 = result["isbn13"].as_str().unwrap_or("-"),
                            isbn10 = result["isbn10"].as_str().unwrap_or("-"),
                            formatted = result["formatted"].as_str().unwrap_or_default(),
                        );
                    } else {
                        println!(
                            "{input}  invalid",
                            input = result["input"].as_str().unwrap_or_default()
                        );
                    }
                }
            }

            Ok(if all_valid {
                ExitCode::Success
            } else {
                ExitCode::InvalidArgs
            })
        }

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config}))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status": "ok",
                            "data": { "path": config_path, "exists": config_path.exists() }
                        }))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        anyhow::bail!(CatalogError::ConfigError(format!(
                            "{} already exists (use --force to overwrite)",
                            config_path.display()
                        )));
                    }
                    AppConfig::default().save_to(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path}}))?;
                    } else {
                        println!("Wrote default config to {}", config_path.display());
                    }
                }
            }
            Ok(ExitCode::Success)
        }
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn run_summary(outcome: &RunOutcome) -> serde_json::Value {
    let report = &outcome.report;
    let artifacts = outcome.artifacts.as_ref().map(|paths| {
        serde_json::json!({
            "canonical_parquet": paths.canonical_parquet,
            "canonical_csv": paths.canonical_csv,
            "detail_parquet": paths.detail_parquet,
            "detail_csv": paths.detail_csv,
            "provenance_parquet": paths.provenance_parquet,
            "provenance_csv": paths.provenance_csv,
            "quality_report": paths.quality_report,
            "schema_doc": paths.schema_doc,
        })
    });

    serde_json::json!({
        "run_id": report.run_id,
        "input_records": report.input_record_count,
        "rejected_rows": report.rejected_row_count,
        "canonical_records": report.record_count,
        "duplicates": report.duplicate_count,
        "pct_valid_isbn13": report.pct_valid_isbn13,
        "rows_per_source": report.rows_per_source,
        "checks": report.checks,
        "artifacts": artifacts,
    })
}

fn print_run_summary(outcome: &RunOutcome, dur: u128) {
    let report = &outcome.report;
    println!("Run {}", report.run_id);
    for (source, rows) in &report.rows_per_source {
        println!("  {source:<20} {rows} rows");
    }
    if report.rejected_row_count > 0 {
        println!("  rejected rows        {}", report.rejected_row_count);
    }
    println!("  canonical records    {}", report.record_count);
    println!("  duplicates merged    {}", report.duplicate_count);
    println!("  valid ISBN-13        {:.2}%", report.pct_valid_isbn13);
    println!("  title present        {:.2}%", report.pct_title);
    println!("  language present     {:.2}%", report.pct_language);

    for check in &report.checks {
        let mark = if check.passed { "ok" } else { "FAILED" };
        println!("  [{mark}] {}: {}", check.name, check.detail);
    }

    match &outcome.artifacts {
        Some(paths) => {
            let dir = paths
                .canonical_parquet
                .parent()
                .unwrap_or_else(|| Path::new("."));
            println!("Artifacts written to {} ({dur} ms)", dir.display());
        }
        None => println!("Dry run, nothing written ({dur} ms)"),
    }
}

fn isbn_report(input: &str) -> serde_json::Value {
    match Isbn::parse(input) {
        Ok(isbn) => serde_json::json!({
            "input": input,
            "valid": true,
            "isbn13": isbn.isbn13,
            "isbn10": isbn.isbn10,
            "formatted": isbn.formatted,
        }),
        Err(_) => {
            let stripped = strip_isbn(input);
            serde_json::json!({
                "input": input,
                "valid": false,
                "isbn13_checksum": validate_isbn13(&stripped),
                "isbn10_checksum": validate_isbn10(&stripped),
            })
        }
    }
}

// ─── Exit codes ──────────────────────────────────────────────────────────────

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let catalog = err.downcast_ref::<CatalogError>().or_else(|| {
        err.downcast_ref::<ResolveError>().and_then(|e| match e {
            ResolveError::Catalog(inner) => Some(inner),
            _ => None,
        })
    });

    if let Some(err) = catalog {
        return match err {
            e if e.is_structural() => ExitCode::InputError,
            CatalogError::ConfigError(_) | CatalogError::TomlParse(_) => ExitCode::InvalidArgs,
            _ => ExitCode::GeneralError,
        };
    }

    match err.downcast_ref::<ResolveError>() {
        Some(ResolveError::MergeInvariant(_)) => ExitCode::InvariantViolation,
        Some(ResolveError::InvalidIsbn(_)) => ExitCode::InvalidArgs,
        _ => ExitCode::GeneralError,
    }
}

fn error_kind(code: ExitCode) -> &'static str {
    match code {
        ExitCode::Success => "none",
        ExitCode::GeneralError => "general",
        ExitCode::InputError => "input",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::InvariantViolation => "invariant_violation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "bookfuse", "-vv", "--json", "run", "--landing", "data/landing", "--dry-run",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                landing, dry_run, ..
            } => {
                assert_eq!(landing, Some(PathBuf::from("data/landing")));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_isbn_requires_values() {
        assert!(Cli::try_parse_from(["bookfuse", "isbn"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let missing = anyhow::Error::from(ResolveError::Catalog(CatalogError::SourceMissing(
            PathBuf::from("landing/goodreads_books.json"),
        )));
        assert_eq!(exit_code_for(&missing), ExitCode::InputError);

        let invariant = anyhow::Error::from(ResolveError::MergeInvariant("dup".to_string()));
        assert_eq!(exit_code_for(&invariant), ExitCode::InvariantViolation);

        let config = anyhow::Error::from(CatalogError::ConfigError("bad".to_string()));
        assert_eq!(exit_code_for(&config), ExitCode::InvalidArgs);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), ExitCode::GeneralError);
    }

    #[test]
    fn test_isbn_report() {
        let valid = isbn_report("0-306-40615-2");
        assert_eq!(valid["valid"], true);
        assert_eq!(valid["isbn13"], "9780306406157");

        let invalid = isbn_report("9780306406158");
        assert_eq!(invalid["valid"], false);
        assert_eq!(invalid["isbn13_checksum"], false);
    }
}
