//! Status command - check the container engine and local state

use crate::cli::commands::cache_store;
use crate::config::{Config, ConfigManager};
use crate::error::{MatrixError, MatrixResult};
use crate::history::RunHistory;
use crate::orchestration::create_runtime;
use crate::ui::{self, UiContext};

/// Execute the status command
pub async fn execute(manager: &ConfigManager, config: &Config) -> MatrixResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "relmatrix status");

    let runtime = create_runtime(config)?;
    let available = runtime.is_available().await?;

    ui::section(&ctx, "Container engine");
    ui::key_value_status(
        &ctx,
        runtime.runtime_name(),
        if available { "available" } else { "not found" },
        available,
    );

    let ready = if available {
        match runtime.ensure_ready().await {
            Ok(()) => true,
            Err(e) => {
                ui::step_warn_hint(&ctx, "Engine not ready", &e.to_string());
                false
            }
        }
    } else {
        false
    };

    ui::section(&ctx, "Paths");
    let config_state = if manager.path().exists() { "found" } else { "missing" };
    ui::key_value_status(
        &ctx,
        "config",
        &format!("{} ({})", manager.path().display(), config_state),
        manager.path().exists(),
    );
    ui::key_value("cache", &cache_store(manager, config).root().display().to_string());
    ui::key_value("publish", &manager.resolve(&config.publish.dir).display().to_string());

    let history = RunHistory::new(config);
    if let Some(last) = history.recent(1).await.pop() {
        ui::section(&ctx, "Last run");
        ui::key_value("run", last["data"]["run_id"].as_str().unwrap_or("-"));
        ui::key_value("status", last["data"]["status"].as_str().unwrap_or("-"));
        ui::key_value("at", last["timestamp"].as_str().unwrap_or("-"));
    }

    if !available {
        return Err(MatrixError::EngineNotFound(config.build.engine.clone()));
    }

    if ready {
        ui::outro_success(&ctx, "Ready to build");
    } else {
        ui::outro_warn(&ctx, "Engine installed but not ready");
    }
    Ok(())
}
