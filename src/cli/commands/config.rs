//! Config command - show, locate or create configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, MatrixConfig, PlatformConfig};
use crate::error::MatrixResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> MatrixResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> MatrixResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Starter configuration with a two-architecture release matrix
pub fn starter_config() -> Config {
    let platform = |architecture: &str| PlatformConfig {
        id: None,
        os_flavor: "distroA".to_string(),
        architecture: architecture.to_string(),
        build_recipe: "ci/build.sh".into(),
        image_definition: "ci/distroA.Dockerfile".into(),
    };

    let mut config = Config::default();
    config.general.default_matrix = Some("release".to_string());
    config.matrix.insert(
        "release".to_string(),
        MatrixConfig {
            platforms: vec![platform("x86_64"), platform("arm64")],
        },
    );
    config
}

async fn init_config(manager: &ConfigManager, force: bool) -> MatrixResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&starter_config()).await?;

    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    ui::remark(
        &ctx,
        "Add ci/build.sh and ci/distroA.Dockerfile, then run: relmatrix validate",
    );

    Ok(())
}
