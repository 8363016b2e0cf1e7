//! `mailgate` - inbound relay planner and module migration runner.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod relay;

use anyhow::{Context, Result};
use clap::Parser;
use mailgate_core::migration::{admin_morph_cleanup, admin_morph_removal};
use mailgate_core::{
    GatewayConfig, HandlerRegistry, HandlerStatus, MailGateway, MigrationLedger, ModuleRepository,
    StepOutcome,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command, MigrateCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=info,mailgate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(GatewayConfig::default_path);
    let config = GatewayConfig::load(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match cli.command {
        Command::Relay(args) => {
            let gateway = MailGateway::open(&config).await?;
            let plan = relay::plan(&gateway, &args).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Migrate { command } => migrate(&config, command).await?,
        Command::Handlers => handlers(&config).await?,
    }

    Ok(())
}

async fn open_stores(config: &GatewayConfig) -> Result<(ModuleRepository, MigrationLedger)> {
    let path = config.database_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path = path.to_string_lossy();

    let modules = ModuleRepository::new(&path)
        .await
        .context("Failed to open module store")?;
    let ledger = MigrationLedger::new(&path)
        .await
        .context("Failed to open migration ledger")?;
    Ok((modules, ledger))
}

async fn migrate(config: &GatewayConfig, command: MigrateCommand) -> Result<()> {
    let state_dir = config.state_dir();
    tokio::fs::create_dir_all(&state_dir)
        .await
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    let (modules, ledger) = open_stores(config).await?;
    let mut steps = vec![admin_morph_removal(&state_dir), admin_morph_cleanup(&state_dir)];

    if let MigrateCommand::Rollback = command {
        steps.reverse();
    }

    for step in &steps {
        let outcome = match command {
            MigrateCommand::Apply => ledger.apply(step, &modules).await?,
            MigrateCommand::Rollback => ledger.rollback(step, &modules).await?,
        };

        match outcome {
            StepOutcome::Ran(program_ids) => {
                println!("{}: done ({} program link(s))", step.name, program_ids.len());
            }
            StepOutcome::Skipped => println!("{}: skipped", step.name),
        }
    }

    Ok(())
}

async fn handlers(config: &GatewayConfig) -> Result<()> {
    let (_, ledger) = open_stores(config).await?;
    let mut registry = HandlerRegistry::builtin();

    for name in registry.purge_tombstones(&ledger.applied().await?) {
        info!("Dropped tombstone for `{name}`");
    }

    for entry in registry.entries() {
        let status = match entry.status() {
            HandlerStatus::Active => "active".to_string(),
            HandlerStatus::Tombstone { removed_by } => format!("tombstone until {removed_by}"),
        };
        println!("{}\t{}\t{}", entry.name(), status, entry.properties().admin_title);
    }

    Ok(())
}
