//! Extension commands

use std::path::Path;

use anyhow::{Context, Result};
use clevert_extensions::ExtensionStore;

use crate::cli::{ExtensionCommands, ExtensionListArgs, ExtensionRemoveArgs};
use crate::output;

pub async fn run(cmd: ExtensionCommands, config_dir: Option<&Path>) -> Result<()> {
    let (loader, config) = super::load_config(config_dir)?;
    let store = ExtensionStore::new(config.extensions_dir(loader.config_dir()));

    match cmd {
        ExtensionCommands::List(args) => list(&store, args).await,
        ExtensionCommands::Remove(args) => remove(&store, args).await,
    }
}

async fn list(store: &ExtensionStore, args: ExtensionListArgs) -> Result<()> {
    let summaries = store
        .summaries()
        .await
        .with_context(|| format!("Failed to list {}", store.root().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        output::info(&format!(
            "No extensions installed in {}",
            store.root().display()
        ));
        return Ok(());
    }

    for summary in &summaries {
        output::header(&format!("{} {}", summary.name, summary.version));
        output::kv("id", &summary.id);
        if !summary.description.is_empty() {
            output::kv("description", &summary.description);
        }
        let actions: Vec<&str> = summary.actions.iter().map(|a| a.id.as_str()).collect();
        output::kv("actions", &actions.join(", "));
        let profiles: Vec<&str> = summary.profiles.iter().map(|p| p.id.as_str()).collect();
        if !profiles.is_empty() {
            output::kv("profiles", &profiles.join(", "));
        }
    }

    Ok(())
}

async fn remove(store: &ExtensionStore, args: ExtensionRemoveArgs) -> Result<()> {
    let dir = store.extension_dir(&args.id, &args.version)?;
    if !dir.exists() {
        output::warning(&format!("{}_{} is not installed", args.id, args.version));
        return Ok(());
    }

    store
        .remove(&args.id, &args.version)
        .await
        .with_context(|| format!("Failed to remove {}", dir.display()))?;
    output::success(&format!("Removed {}_{}", args.id, args.version));
    Ok(())
}
