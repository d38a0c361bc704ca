//! List command - show platforms with their cache state

use crate::cache::{self, CacheEntry, CacheStore};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::cli::commands::{cache_store, load_registry};
use crate::config::{Config, ConfigManager};
use crate::error::MatrixResult;
use crate::platform::PlatformDescriptor;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::collections::HashMap;

/// Whether a platform's current inputs have a usable cached layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CacheState {
    Cached,
    Stale,
    Missing,
    Unreadable,
}

#[derive(Debug, Serialize)]
struct PlatformRow {
    #[serde(flatten)]
    descriptor: PlatformDescriptor,
    cache_key: Option<String>,
    cache: CacheState,
}

/// Execute the list command
pub async fn execute(args: ListArgs, manager: &ConfigManager, config: &Config) -> MatrixResult<()> {
    let (name, registry) = load_registry(manager, config, args.matrix.as_deref())?;

    let entries: HashMap<String, CacheEntry> = cache_store(manager, config)
        .list()
        .await?
        .into_iter()
        .map(|e| (e.platform_id.clone(), e))
        .collect();

    let mut rows = Vec::with_capacity(registry.len());
    for descriptor in registry.descriptors() {
        let key = cache::resolve(descriptor).await.ok();
        let state = cache_state(key.as_ref().map(|k| k.as_str()), entries.get(&descriptor.id));
        rows.push(PlatformRow {
            descriptor: descriptor.clone(),
            cache_key: key.map(|k| k.to_string()),
            cache: state,
        });
    }

    match args.format {
        OutputFormat::Table => print_table(&name, &rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.descriptor.id);
            }
        }
    }

    Ok(())
}

fn cache_state(key: Option<&str>, entry: Option<&CacheEntry>) -> CacheState {
    match (key, entry) {
        (None, _) => CacheState::Unreadable,
        (Some(_), None) => CacheState::Missing,
        (Some(key), Some(entry)) if entry.key.as_str() == key => CacheState::Cached,
        (Some(_), Some(_)) => CacheState::Stale,
    }
}

fn print_table(name: &str, rows: &[PlatformRow]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Matrix '{}'", name));

    println!(
        "{:<24} {:<12} {:<10} {:<14} {:<10}",
        style("ID").bold(),
        style("FLAVOR").bold(),
        style("ARCH").bold(),
        style("KEY").bold(),
        style("CACHE").bold()
    );
    println!("{}", "-".repeat(72));

    for row in rows {
        let key = row
            .cache_key
            .as_deref()
            .map(|k| &k[..k.len().min(12)])
            .unwrap_or("-");
        let state = match row.cache {
            CacheState::Cached => style("cached").green(),
            CacheState::Stale => style("stale").yellow(),
            CacheState::Missing => style("missing").dim(),
            CacheState::Unreadable => style("unreadable").red(),
        };

        println!(
            "{:<24} {:<12} {:<10} {:<14} {:<10}",
            row.descriptor.id, row.descriptor.os_flavor, row.descriptor.architecture, key, state
        );
    }

    println!();
    println!("{} platform(s)", rows.len());
}
