mod input;
mod overrides;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dupescope_core::{AppConfig, DupescopeError, ExitCode, MatchConfig, RecordId, SetStatus};
use dupescope_engine::merge::index_records;
use dupescope_engine::{
    CancelToken, DuplicateClusterer, ResolutionWorkflow, TracingAuditSink, merge_records,
};

use crate::input::load_records;
use crate::overrides::MatchOverrides;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "dupescope",
    about = "Find, review and merge duplicate records",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting DUPESCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect duplicate sets in a JSON file of records.
    Detect {
        /// Records file, or `-` for stdin.
        input: PathBuf,
        #[command(flatten)]
        overrides: MatchOverrides,
    },

    /// Merge the detected set containing the given records.
    Merge {
        input: PathBuf,
        /// Record to keep in the merge; repeat for every member.
        #[arg(long, required = true, action = clap::ArgAction::Append)]
        member: Vec<String>,
        /// Show the merged record without committing it.
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        overrides: MatchOverrides,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config as TOML.
    Show,
    /// Print the config file path.
    Path,
    /// Write the default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing();

    let json_output = cli.json || std::env::var("DUPESCOPE_JSON").as_deref() == Ok("1");
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Detect { input, overrides } => {
            let records = load_records(&input)?;
            let matching = or_exit(json_output, start, effective_matching(&config, &overrides));

            let workflow = workflow(&config);
            let outcome = or_exit(
                json_output,
                start,
                workflow.run_pass(&records, &matching, &CancelToken::new()),
            );
            let Some(detection) = outcome.completed() else {
                anyhow::bail!("detection pass was cancelled");
            };
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": detection,
                    "meta": { "duration_ms": dur, "records": records.len() }
                }))?;
            } else if detection.sets.is_empty() {
                println!(
                    "No duplicates among {} records ({} pairs compared).",
                    records.len(),
                    detection.compared
                );
            } else {
                for set in &detection.sets {
                    let members: Vec<&str> = set.members().iter().map(RecordId::as_str).collect();
                    println!(
                        "{id:<10}  {sim:.3}  {status:<8}  {members}",
                        id = set.id().to_string(),
                        sim = set.similarity(),
                        status = set.status().to_string(),
                        members = members.join(", "),
                    );
                }
                let note = if detection.approximate_similarity {
                    " (blocking on, similarities approximate)"
                } else {
                    ""
                };
                println!(
                    "\n{} sets, {} pairs compared{note}",
                    detection.sets.len(),
                    detection.compared
                );
            }
        }

        Commands::Merge {
            input,
            member,
            dry_run,
            overrides,
        } => {
            let records = load_records(&input)?;
            let matching = or_exit(json_output, start, effective_matching(&config, &overrides));

            let mut wanted: Vec<RecordId> = member.into_iter().map(RecordId::from).collect();
            wanted.sort();
            wanted.dedup();
            if wanted.len() < 2 {
                fail(
                    json_output,
                    start,
                    ExitCode::InvalidArgs,
                    "invalid_args",
                    "merge needs at least two --member records".to_string(),
                );
            }

            let workflow = workflow(&config);
            let outcome = or_exit(
                json_output,
                start,
                workflow.run_pass(&records, &matching, &CancelToken::new()),
            );
            let Some(detection) = outcome.completed() else {
                anyhow::bail!("detection pass was cancelled");
            };

            let Some(set) = detection
                .sets
                .iter()
                .find(|set| wanted.iter().all(|id| set.contains(id)))
            else {
                let ids: Vec<&str> = wanted.iter().map(RecordId::as_str).collect();
                fail(
                    json_output,
                    start,
                    ExitCode::NotFound,
                    "not_found",
                    format!("No duplicate set contains all of: {}", ids.join(", ")),
                );
            };
            let set_id = set.id();

            // Members the caller left out are split off before merging.
            let dropped: Vec<RecordId> = set
                .members()
                .iter()
                .filter(|id| !wanted.contains(id))
                .cloned()
                .collect();

            let merged = if dry_run && dropped.is_empty() {
                or_exit(json_output, start, workflow.preview_merge(set_id, &records))
            } else if dry_run {
                let index = index_records(&records);
                or_exit(
                    json_output,
                    start,
                    merge_records(set_id, &wanted, &index, matching.case_sensitive),
                )
            } else {
                for id in &dropped {
                    or_exit(json_output, start, workflow.remove_member(set_id, id));
                }
                or_exit(json_output, start, workflow.merge(set_id, &records))
            };
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "merged": merged, "dropped": dropped, "committed": !dry_run },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                let verb = if dry_run { "Would merge" } else { "Merged" };
                println!("{verb} {} into one record:", merged.set_id);
                for (name, value) in &merged.fields {
                    let source = merged.source_of(name).map(RecordId::as_str).unwrap_or("?");
                    println!("  {name:<12} {value:<40} (from {source})");
                }
                if !dropped.is_empty() {
                    let ids: Vec<&str> = dropped.iter().map(RecordId::as_str).collect();
                    println!("Left out: {}", ids.join(", "));
                }
                let pending = workflow.sets_with_status(SetStatus::Pending).len();
                if pending > 0 {
                    println!("{pending} other sets still pending review.");
                }
            }
        }

        // ── Config ─────────────────────────────────────────────────────────

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Path => {
                    let path = AppConfig::config_path();
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path,"exists":path.exists()},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    let path = AppConfig::config_path();
                    if path.exists() && !force {
                        fail(
                            json_output,
                            start,
                            ExitCode::Conflict,
                            "conflict",
                            format!("{} already exists (use --force to overwrite)", path.display()),
                        );
                    }
                    AppConfig::default().save()?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Wrote {}", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `RUST_LOG` overrides the default `dupescope=info`.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dupescope=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// The configured matching policy with command-line overrides, validated.
fn effective_matching(
    config: &AppConfig,
    overrides: &MatchOverrides,
) -> dupescope_core::Result<MatchConfig> {
    let mut matching = config.matching.clone();
    overrides.apply(&mut matching);
    matching.validate()?;
    Ok(matching)
}

fn workflow(config: &AppConfig) -> ResolutionWorkflow {
    ResolutionWorkflow::new(
        DuplicateClusterer::new(config.engine.clone()),
        Arc::new(TracingAuditSink),
    )
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

/// Unwrap an engine result or report the error and exit with its code.
fn or_exit<T>(json_output: bool, start: Instant, result: dupescope_core::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let (code, kind) = classify(&err);
            fail(json_output, start, code, kind, err.to_string())
        }
    }
}

fn classify(err: &DupescopeError) -> (ExitCode, &'static str) {
    match err {
        e if e.is_not_found() => (ExitCode::NotFound, "not_found"),
        DupescopeError::InvalidConfig(_) | DupescopeError::DuplicateRecordId(_) => {
            (ExitCode::InvalidArgs, "invalid_args")
        }
        DupescopeError::InvalidTransition { .. } => (ExitCode::Conflict, "conflict"),
        _ => (ExitCode::GeneralError, "error"),
    }
}

fn fail(json_output: bool, start: Instant, code: ExitCode, kind: &str, message: String) -> ! {
    if json_output {
        let body = serde_json::json!({
            "status": "error",
            "error": kind,
            "message": message,
            "meta": { "duration_ms": start.elapsed().as_millis() }
        });
        println!("{body:#}");
    } else {
        eprintln!("Error: {message}");
    }
    std::process::exit(code as i32);
}
