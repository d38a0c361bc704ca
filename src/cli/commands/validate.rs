//! Validate command - check a matrix declaration without building

use crate::cli::args::ValidateArgs;
use crate::cli::commands::load_registry;
use crate::config::{Config, ConfigManager};
use crate::error::MatrixResult;
use crate::ui::{self, UiContext};

/// Execute the validate command
pub async fn execute(
    args: ValidateArgs,
    manager: &ConfigManager,
    config: &Config,
) -> MatrixResult<()> {
    let ctx = UiContext::detect();
    let (name, registry) = load_registry(manager, config, args.matrix.as_deref())?;

    ui::intro(&ctx, &format!("Matrix '{}'", name));
    for descriptor in registry.descriptors() {
        ui::step_ok_detail(
            &ctx,
            &descriptor.id,
            &format!("{} on {}", descriptor.os_flavor, descriptor.architecture),
        );
    }
    ui::outro_success(
        &ctx,
        &format!("{} platform(s) valid in {}", registry.len(), manager.path().display()),
    );

    Ok(())
}
