//! Sterling CLI - command-line front end for the semantic ledger.

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use sterling_core::{ClaimDelta, Ledger, RunIntent, SchemaDef, SterlingConfig, TaskSpec};

#[derive(Parser)]
#[command(name = "sterling")]
#[command(about = "Sterling - a content-addressed semantic ledger")]
struct Cli {
    /// Path to the ledger's storage directory.
    #[arg(long, default_value = "./sterling.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Register a schema from a JSON file.
    RegisterSchema {
        /// Path to a JSON-encoded `SchemaDef`.
        schema_file: PathBuf,
    },
    /// Commit a claim delta from a JSON file.
    Commit {
        /// Path to a JSON-encoded `ClaimDelta`.
        delta_file: PathBuf,
        /// The operator id recorded on the resulting op.
        #[arg(long, default_value = "cli.commit")]
        operator_id: String,
        /// Run intent: dev, certifying, promotion, replay.
        #[arg(long, default_value = "dev")]
        intent: String,
    },
    /// Look up a single claim by its signature.
    LookupSignature { signature: String },
    /// List all live claims under a schema.
    ListSchema { schema_id: String },
    /// List conflicts touching a claim signature.
    Conflicts { signature: String },
    /// Assemble a decision packet from a JSON-encoded `TaskSpec`.
    Assemble { task_file: PathBuf },
    /// Show registered schemas and recorded witnesses.
    Status,
}

fn parse_intent(s: &str) -> anyhow::Result<RunIntent> {
    match s {
        "dev" => Ok(RunIntent::Dev),
        "certifying" => Ok(RunIntent::Certifying),
        "promotion" => Ok(RunIntent::Promotion),
        "replay" => Ok(RunIntent::Replay),
        other => anyhow::bail!("unknown run intent '{other}', expected dev/certifying/promotion/replay"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let ledger = Ledger::open(&cli.db, SterlingConfig::default()).context("opening ledger storage")?;

    match cli.command {
        Commands::RegisterSchema { schema_file } => {
            let bytes = std::fs::read(&schema_file).with_context(|| format!("reading {}", schema_file.display()))?;
            let schema: SchemaDef = serde_json::from_slice(&bytes).context("parsing schema definition")?;
            let schema_id = schema.schema_id.clone();
            ledger.register_schema(schema)?;
            tracing::info!(schema_id, "schema registered");
        }
        Commands::Commit { delta_file, operator_id, intent } => {
            let bytes = std::fs::read(&delta_file).with_context(|| format!("reading {}", delta_file.display()))?;
            let delta: ClaimDelta = serde_json::from_slice(&bytes).context("parsing claim delta")?;
            let op = ledger.commit(operator_id, BTreeMap::new(), delta, vec![], parse_intent(&intent)?)?;
            println!("{}", serde_json::to_string_pretty(&op)?);
        }
        Commands::LookupSignature { signature } => match ledger.lookup_by_signature(&signature) {
            Some(claim) => println!("{}", serde_json::to_string_pretty(&claim)?),
            None => println!("no live claim at signature {signature}"),
        },
        Commands::ListSchema { schema_id } => {
            let claims = ledger.list_by_schema(&schema_id);
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Conflicts { signature } => {
            let conflicts = ledger.conflicts_touching(&signature);
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        }
        Commands::Assemble { task_file } => {
            let bytes = std::fs::read(&task_file).with_context(|| format!("reading {}", task_file.display()))?;
            let task: TaskSpec = serde_json::from_slice(&bytes).context("parsing task spec")?;
            let packet = ledger.assemble_packet(&task, chrono::Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&packet)?);
        }
        Commands::Status => {
            let witnesses = ledger.list_witnesses()?;
            println!("witnesses recorded: {}", witnesses.len());
        }
    }

    Ok(())
}
