use std::io::Write;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};
use stow_backend::{BackendSelector, Platform};
use stow_store::{Storage, StorageConfig};
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    debug!(data_dir = %config.backend.data_dir.display(), "resolved configuration");
    let storage = Storage::open(config, &BackendSelector::new()).context("failed to open store")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&storage, cli.command, cli.format, &mut out).await
}

/// Resolve the store configuration from the config file and flags.
///
/// The CLI always works against the desktop file store. Raw errors are
/// surfaced only when `--debug` is passed or the config file sets `debug`
/// explicitly; the build profile never turns them on.
fn build_config(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StorageConfig {
            debug: false,
            ..Default::default()
        },
    };
    config.backend.platform = Some(Platform::Desktop);
    if let Some(dir) = &cli.dir {
        config.backend.data_dir = dir.clone();
    }
    config.debug |= cli.debug;
    Ok(config)
}

fn load_config_file(path: &Path) -> anyhow::Result<StorageConfig> {
    let text = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&text)?;
    let mut config = StorageConfig::from_toml_str(&text)?;
    if !table.contains_key("debug") {
        config.debug = false;
    }
    Ok(config)
}

async fn execute(
    storage: &Storage,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Get(args) => cmd_get(storage, args, format, out).await,
        Command::Set(args) => cmd_set(storage, args, format, out).await,
        Command::Rm(args) => cmd_rm(storage, args, format, out).await,
        Command::Keys => cmd_keys(storage, format, out).await,
        Command::Clear => cmd_clear(storage, format, out).await,
    }
}

async fn cmd_get(storage: &Storage, args: GetArgs, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    let value = storage.get_value(&args.key).await?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "key": args.key, "value": value }))?,
        OutputFormat::Text if value.is_null() => writeln!(out, "{} {}", args.key.bold(), "(not set)".dimmed())?,
        OutputFormat::Text => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
    }
    Ok(())
}

async fn cmd_set(storage: &Storage, args: SetArgs, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    let value = if args.raw {
        Value::String(args.value)
    } else {
        serde_json::from_str(&args.value)
            .with_context(|| format!("'{}' is not valid JSON (pass --raw to store it as a string)", args.value))?
    };
    let stored = storage.set_value(&args.key, &value).await?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "key": args.key, "value": stored }))?,
        OutputFormat::Text => writeln!(out, "{} {} = {}", "✓".green().bold(), args.key.bold(), stored)?,
    }
    Ok(())
}

async fn cmd_rm(storage: &Storage, args: RmArgs, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    match args.keys.as_slice() {
        [key] => storage.remove_item(key).await?,
        keys => storage.remove_items(keys).await?,
    }
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "removed": args.keys }))?,
        OutputFormat::Text => {
            for key in &args.keys {
                writeln!(out, "  {} {}", "removed:".red(), key)?;
            }
        }
    }
    Ok(())
}

async fn cmd_keys(storage: &Storage, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    let mut keys = storage.get_keys().await?;
    keys.sort();
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!(keys))?,
        OutputFormat::Text if keys.is_empty() => writeln!(out, "No keys.")?,
        OutputFormat::Text => {
            for key in &keys {
                writeln!(out, "{key}")?;
            }
        }
    }
    Ok(())
}

async fn cmd_clear(storage: &Storage, format: OutputFormat, out: &mut impl Write) -> anyhow::Result<()> {
    let count = storage.get_keys().await?.len();
    storage.clear().await?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "cleared": count }))?,
        OutputFormat::Text => writeln!(out, "{} Cleared {} keys.", "✓".green().bold(), count)?,
    }
    Ok(())
}
