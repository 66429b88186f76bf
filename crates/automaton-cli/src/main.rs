mod cli;
mod executors;
mod state;

use std::collections::HashMap;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, RollbackCommand};
use serde_json::Value;
use state::AppState;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.quiet, cli.verbose);

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(automaton_infra::config::default_data_dir);
    let state = AppState::init(data_dir).await?;

    match cli.command {
        Commands::Run { file, context } => run_workflow(&state, file, context, cli.json).await?,
        Commands::Permissions { action, limit } => print_audit_logs(&state, action, limit, cli.json),
        Commands::Rollback { action } => handle_rollback(&state, action, cli.json).await?,
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn init_tracing(quiet: bool, verbosity: u8) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info,automaton=debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

async fn run_workflow(
    state: &AppState,
    file: std::path::PathBuf,
    context: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(&file).await?;
    let is_yaml = matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let definition = if is_yaml {
        automaton_core::workflow::definition::ingest_workflow_yaml(&content)?
    } else {
        automaton_core::workflow::definition::ingest_workflow_json(&content)?
    };

    let initial_context: HashMap<String, Value> = match context {
        Some(raw) => serde_json::from_str(&raw)?,
        None => HashMap::new(),
    };

    let result = state.engine.execute_workflow(&definition, initial_context).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.context)?);
    } else {
        println!("run {} finished with {} task(s):", result.run_id, result.tasks.len());
        for task in &result.tasks {
            println!("  - {} [{}]: {:?}", task.id, task.name, task.status);
        }
        println!("final context: {}", serde_json::to_string_pretty(&result.context)?);
    }

    Ok(())
}

fn print_audit_logs(state: &AppState, action: Option<String>, limit: usize, json: bool) {
    let action_kind = action.as_deref().map(executors::action_kind_for);
    let logs = state.permissions.get_audit_logs(action_kind.as_ref(), None, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&logs).unwrap_or_default());
        return;
    }

    for log in &logs {
        println!(
            "{} {:?} -> {:?} (risk: {:?})",
            log.timestamp, log.action_kind, log.decision, log.risk_level
        );
    }
}

async fn handle_rollback(state: &AppState, action: RollbackCommand, json: bool) -> anyhow::Result<()> {
    match action {
        RollbackCommand::List { committed } => {
            let transactions = state.rollback.list_transactions(committed);
            if json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
            } else {
                for tx in &transactions {
                    println!("{} {} (committed: {})", tx.id, tx.name, tx.committed);
                }
            }
        }
        RollbackCommand::Apply { id } => {
            let tx_id: Uuid = id.parse()?;
            state.rollback.rollback(tx_id).await?;
            println!("rolled back transaction {tx_id}");
        }
    }

    Ok(())
}
