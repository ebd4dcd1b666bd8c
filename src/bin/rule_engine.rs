//! `rule-engine` CLI: validate rule expressions, ingest spans, import rule
//! sets, and query recorded violations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rule_engine::config::EngineConfig;
use rule_engine::contracts::Contracts;
use rule_engine::signing::SigningService;
use rule_engine::span::Span;
use rule_engine::store::ViolationFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rule-engine", version, about = "Trace behavior rule engine")]
struct Cli {
    /// Path to a TOML config file. Falls back to built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HMAC signing secret for the violation store. Overrides the config
    /// file and `RULE_ENGINE_SIGNING_SECRET`.
    #[arg(long, global = true)]
    signing_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a rule expression without registering it.
    Validate {
        /// DSL expression, or '-' to read from stdin.
        expression: String,
    },
    /// Ingest a JSON array of spans from a file.
    Ingest {
        tenant_id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Import a YAML rule set for a tenant.
    Import {
        tenant_id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Query recorded violations for a tenant.
    Query {
        tenant_id: String,
        #[arg(long)]
        rule_id: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            EngineConfig::from_toml(&text)?
        }
        None => EngineConfig::default(),
    };

    let secret = cli
        .signing_secret
        .or_else(|| std::env::var("RULE_ENGINE_SIGNING_SECRET").ok())
        .or(config.signing_secret.clone())
        .context("no signing secret provided (use --signing-secret, RULE_ENGINE_SIGNING_SECRET, or config)")?;
    let signer = SigningService::new(secret)?;
    let contracts = Contracts::new(config, signer);

    match cli.command {
        Command::Validate { expression } => {
            contracts.validate(&expression)?;
            println!("ok");
        }
        Command::Ingest { tenant_id, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut spans: Vec<Span> =
                serde_json::from_str(&text).context("parsing spans as JSON")?;
            for span in &mut spans {
                span.tenant_id = tenant_id.clone();
            }
            let report = contracts.ingest_spans(spans);
            println!(
                "ingested {}/{} spans ({} failed)",
                report.ingested,
                report.total,
                report.failed.len()
            );
            for failure in &report.failed {
                eprintln!("  [{}] {}", failure.offset, failure.reason);
            }
        }
        Command::Import { tenant_id, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let report =
                rule_engine::import::import_yaml(contracts.registry(), &tenant_id, &text);
            println!(
                "imported {}/{} rules ({} failed)",
                report.succeeded, report.total, report.failed
            );
            for error in &report.errors {
                eprintln!("  [{}] {}", error.index, error.message);
            }
        }
        Command::Query {
            tenant_id,
            rule_id,
            limit,
        } => {
            let filter = ViolationFilter {
                rule_id,
                limit,
                ..Default::default()
            };
            let violations = contracts.query_violations(&tenant_id, &filter);
            println!("{}", serde_json::to_string_pretty(&violations)?);
        }
    }

    Ok(())
}
