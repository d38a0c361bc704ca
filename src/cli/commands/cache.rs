//! Cache command - manage cached image layers

use crate::cache::{format_bytes, CacheEntry, CacheStore};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::commands::cache_store;
use crate::config::{Config, ConfigManager};
use crate::error::MatrixResult;
use crate::ui::{self, UiContext};
use chrono::Utc;
use console::style;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, manager: &ConfigManager, config: &Config) -> MatrixResult<()> {
    let store = cache_store(manager, config);
    debug!("Cache store at {}", store.root().display());

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Gc { days, dry_run } => {
            gc_entries(&store, days.unwrap_or(config.cache.gc_days), dry_run).await
        }
        CacheAction::Clear { platform, yes } => {
            let ctx = UiContext::detect().with_auto_yes(yes);
            clear_entries(&ctx, &store, platform).await
        }
    }
}

async fn list_entries(store: &dyn CacheStore, format: OutputFormat) -> MatrixResult<()> {
    let entries = store.list().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.platform_id);
            }
        }
        OutputFormat::Table if entries.is_empty() => {
            ui::step_info(&UiContext::detect(), "No cached layers");
        }
        OutputFormat::Table => print_table(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<24} {:<14} {:<10} {:<20}",
        style("PLATFORM").bold(),
        style("KEY").bold(),
        style("SIZE").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(70));

    let mut total = 0;
    for entry in entries {
        total += entry.size_bytes;
        println!(
            "{:<24} {:<14} {:<10} {:<20}",
            entry.platform_id,
            entry.key.short(),
            format_bytes(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("{} layer(s), {} total", entries.len(), format_bytes(total));
}

/// Entries due for removal at the given age threshold
async fn expired(store: &dyn CacheStore, days: u32) -> MatrixResult<Vec<CacheEntry>> {
    Ok(store
        .list()
        .await?
        .into_iter()
        .filter(|e| e.is_older_than_days(days))
        .collect())
}

async fn gc_entries(store: &dyn CacheStore, days: u32, dry_run: bool) -> MatrixResult<()> {
    let ctx = UiContext::detect();

    if days == 0 {
        ui::step_info(&ctx, "Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let to_remove = expired(store, days).await?;
    if to_remove.is_empty() {
        ui::step_info(&ctx, &format!("No cached layers older than {} days", days));
        return Ok(());
    }

    for entry in &to_remove {
        let age = (Utc::now() - entry.created_at).num_days();
        ui::step_info(
            &ctx,
            &format!("{} ({} days old, {})", entry.platform_id, age, format_bytes(entry.size_bytes)),
        );
    }

    if dry_run {
        ui::remark(&ctx, "Dry run - nothing removed");
        return Ok(());
    }

    let mut removed = 0;
    for entry in &to_remove {
        if store.remove(&entry.platform_id).await? {
            removed += 1;
        }
    }

    ui::step_ok(&ctx, &format!("Removed {} cached layer(s)", removed));
    Ok(())
}

async fn clear_entries(
    ctx: &UiContext,
    store: &dyn CacheStore,
    platform: Option<String>,
) -> MatrixResult<()> {
    let targets: Vec<String> = store
        .list()
        .await?
        .into_iter()
        .map(|e| e.platform_id)
        .filter(|id| platform.as_ref().map_or(true, |p| p == id))
        .collect();

    if targets.is_empty() {
        ui::step_info(ctx, "No cached layers to clear");
        return Ok(());
    }

    let prompt = format!("Remove {} cached layer(s)?", targets.len());
    if !ui::confirm(ctx, &prompt, false).await? {
        ui::step_info(ctx, "Aborted");
        return Ok(());
    }

    for id in &targets {
        store.remove(id).await?;
    }

    ui::step_ok(ctx, &format!("Cleared {} cached layer(s)", targets.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheKey, FsCacheStore};
    use tempfile::TempDir;

    async fn store_with(dir: &TempDir, ids: &[&str]) -> FsCacheStore {
        let store = FsCacheStore::new(dir.path().join("cache"));
        for id in ids {
            let payload = dir.path().join(format!("{}.tar", id));
            std::fs::write(&payload, b"layer").unwrap();
            store
                .store(id, &CacheKey::from_hex("ab".repeat(32)), &payload)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn fresh_entries_are_not_expired() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["x86_64-distroA"]).await;

        assert!(expired(&store, 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dry_run_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["x86_64-distroA"]).await;

        gc_entries(&store, 30, true).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_single_platform() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["x86_64-distroA", "arm64-distroA"]).await;

        let ctx = UiContext::non_interactive().with_auto_yes(true);
        clear_entries(&ctx, &store, Some("arm64-distroA".to_string()))
            .await
            .unwrap();

        let left: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.platform_id)
            .collect();
        assert_eq!(left, vec!["x86_64-distroA"]);
    }

    #[tokio::test]
    async fn clear_without_confirmation_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &["x86_64-distroA"]).await;

        // Non-interactive and not --yes: confirm falls back to "no"
        clear_entries(&UiContext::non_interactive(), &store, None)
            .await
            .unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
