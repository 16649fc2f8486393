//! `trustgraph`: validate credential collections as a trust graph.
//!
//! Provides three subcommands:
//!
//! - **`validate`**: ingest credentials, run the rule catalog and report on
//!   every product claim and issuer.
//! - **`rules`**: list the rule catalog in execution order.
//! - **`inspect`**: re-resolve a previously exported N-Quads snapshot.
//!
//! Credential files may hold a single JSON object or an array of them. Pass
//! `-` to read from stdin.

mod config;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use trustgraph::snapshot;
use trustgraph::verify::{resolve, resolve_snapshot, VerificationReport};
use trustgraph::{CredentialDocument, RuleEngine};

use config::ValidatorConfig;

/// trustgraph: credential trust-graph validator
#[derive(Parser)]
#[command(name = "trustgraph", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(clap::Args)]
struct RuleArgs {
    /// Replacement rule catalog (JSON). Defaults to the embedded catalog.
    #[arg(long, env = "TRUSTGRAPH_RULES", value_name = "FILE")]
    rules: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a collection of credentials.
    ///
    /// Exits 0 when every claim is verified and every issuer is attested,
    /// 1 when verification fails, 2 on usage or I/O errors.
    Validate {
        /// Credential JSON files, or `-` for stdin.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// A trusted identity anchor IRI. Repeat for several.
        #[arg(
            long = "trusted-anchor",
            env = "TRUSTGRAPH_TRUSTED_ANCHORS",
            value_delimiter = ',',
            value_name = "IRI"
        )]
        trusted_anchors: Vec<String>,

        /// JSON file containing an array of trusted anchor IRIs.
        #[arg(long, value_name = "FILE")]
        trust_list: Option<PathBuf>,

        #[command(flatten)]
        rules: RuleArgs,

        /// Write the enriched fact store to FILE as N-Quads, headed by a
        /// record of the run status.
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List the rule catalog in execution order.
    Rules {
        #[command(flatten)]
        rules: RuleArgs,
    },

    /// Report on an exported N-Quads snapshot without re-ingesting.
    ///
    /// Without `--infer` the report carries the run status recorded in the
    /// snapshot, or "unknown" when there is none.
    Inspect {
        /// Snapshot file, or `-` for stdin.
        snapshot: PathBuf,

        /// Run the rule catalog over the snapshot before resolving.
        #[arg(long)]
        infer: bool,

        #[command(flatten)]
        rules: RuleArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "trustgraph=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate {
            files,
            trusted_anchors,
            trust_list,
            rules,
            export,
            format,
        } => {
            let config = ValidatorConfig::new(trusted_anchors, trust_list.as_deref(), rules.rules)
                .unwrap_or_else(|e| fatal(&e));
            let validator = config.validator().unwrap_or_else(|e| fatal(&e));

            let mut documents = Vec::new();
            for file in &files {
                documents.extend(read_documents(file));
            }

            let run = validator.validate(&documents);

            if let Some(path) = export {
                let text = snapshot::to_nquads_with_status(&run.store, &run.report.status);
                fs::write(&path, text).unwrap_or_else(|e| {
                    fatal(&format!("failed to write {}: {}", path.display(), e))
                });
            }

            emit(&run.report, format);
            exit_for(&run.report);
        }

        Command::Rules { rules } => {
            let config = ValidatorConfig {
                rules: rules.rules,
                ..Default::default()
            };
            let catalog = config.catalog().unwrap_or_else(|e| fatal(&e));
            for (i, rule) in catalog.iter().enumerate() {
                match &rule.description {
                    Some(d) => println!("{:>2}. {}  {}", i + 1, rule.id, d),
                    None => println!("{:>2}. {}", i + 1, rule.id),
                }
            }
        }

        Command::Inspect {
            snapshot: path,
            infer,
            rules,
            format,
        } => {
            let text = read_input(&path);
            let mut store = snapshot::load_nquads(&text).unwrap_or_else(|e| {
                fatal(&format!("invalid snapshot {}: {}", path.display(), e))
            });

            let report = if infer {
                let config = ValidatorConfig {
                    rules: rules.rules,
                    ..Default::default()
                };
                let catalog = config.catalog().unwrap_or_else(|e| fatal(&e));
                let inference = RuleEngine::new(catalog).run_inferences(&mut store);
                resolve(&store, inference)
            } else {
                resolve_snapshot(&store, snapshot::recorded_status(&text))
            };
            emit(&report, format);
            exit_for(&report);
        }
    }
}

fn emit(report: &VerificationReport, format: Format) {
    match format {
        Format::Text => print!("{}", trustgraph::render::render_report(report)),
        Format::Json => {
            let json = serde_json::to_string_pretty(report)
                .unwrap_or_else(|e| fatal(&format!("failed to serialise report: {}", e)));
            println!("{json}");
        }
    }
}

fn exit_for(report: &VerificationReport) {
    if !report.is_valid() {
        process::exit(1);
    }
}

/// Split a credential file into documents.
///
/// A top-level array yields one document per element, labelled
/// `file[index]`; anything else is a single document.
fn read_documents(path: &Path) -> Vec<CredentialDocument> {
    let text = read_input(path);
    let label = path.display().to_string();
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(items)) => {
            if items.is_empty() {
                tracing::warn!(file = %label, "credential file contains an empty array");
            }
            items
                .into_iter()
                .enumerate()
                .map(|(i, body)| CredentialDocument::new(format!("{label}[{i}]"), body))
                .collect()
        }
        Ok(body) => vec![CredentialDocument::new(label, body)],
        Err(e) => fatal(&format!("failed to parse {} as JSON: {}", label, e)),
    }
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &Path) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {}", e)));
        buf
    } else {
        fs::read_to_string(path).unwrap_or_else(|e| {
            fatal(&format!("failed to read {}: {}", path.display(), e))
        })
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("trustgraph: {}", msg);
    process::exit(2);
}
