//! Run command - build every platform of a matrix

use crate::artifact::{DirectorySink, PublishOutcome, Publisher};
use crate::build::{BuildExecutor, ExecutorSettings, JobStatus, RunObserver};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::cli::commands::{cache_store, load_registry};
use crate::config::{Config, ConfigManager};
use crate::error::{MatrixError, MatrixResult};
use crate::history::RunHistory;
use crate::matrix::{MatrixOrchestrator, RunResult};
use crate::orchestration::create_runtime;
use crate::ui::{self, MatrixProgress, UiContext};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Execute the run command
pub async fn execute(args: RunArgs, manager: &ConfigManager, config: &Config) -> MatrixResult<()> {
    let ctx = UiContext::detect().with_plain(args.format != OutputFormat::Table);

    let (matrix, registry) = load_registry(manager, config, args.matrix.as_deref())?;
    let registry = registry.select(&args.platforms)?;

    let runtime = create_runtime(config)?;
    if !runtime.is_available().await? {
        return Err(MatrixError::EngineNotFound(config.build.engine.clone()));
    }
    runtime.ensure_ready().await?;

    let source_root = manager.resolve(&config.build.source_root);
    let source_root = source_root
        .canonicalize()
        .map_err(|_| MatrixError::PathNotFound(source_root.clone()))?;

    let run_id = Uuid::new_v4();
    let short_id: String = run_id.simple().to_string().chars().take(8).collect();
    let work_dir = ConfigManager::state_dir().join("runs").join(&short_id);

    if args.format == OutputFormat::Table {
        ui::intro(
            &ctx,
            &format!("relmatrix run {} ({} platform(s))", matrix, registry.len()),
        );
    }

    let progress = Arc::new(MatrixProgress::new(&ctx));
    let observer: Arc<dyn RunObserver> = progress.clone();
    let executor = BuildExecutor::new(
        runtime,
        ExecutorSettings {
            run_id: short_id,
            os_family: config.product.os_family.clone(),
            artifact_path: config.product.artifact_path.clone(),
            source_root,
            work_dir: work_dir.clone(),
            timeout: Duration::from_secs(config.build.timeout_secs),
        },
    )
    .with_observer(observer);

    let publish_dir = manager.resolve(&config.publish.dir);
    let publisher = Publisher::new(
        config.product.name.clone(),
        config.product.os_family.clone(),
        Arc::new(DirectorySink::new(publish_dir)),
    );

    let mut orchestrator = MatrixOrchestrator::new(run_id, matrix, executor, publisher)
        .with_max_parallel(config.build.max_parallel);
    if config.cache.enabled && !args.no_cache {
        orchestrator = orchestrator.with_cache(Arc::new(cache_store(manager, config)));
    } else {
        debug!("Layer cache disabled for this run");
    }

    let result = orchestrator.run(&registry).await;
    progress.finish();

    RunHistory::new(config).record_run(&result).await;

    if result.succeeded() {
        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            debug!("Could not remove {}: {}", work_dir.display(), e);
        }
    } else {
        warn!("Keeping build outputs in {}", work_dir.display());
    }

    if let Some(ref path) = args.report {
        write_report(path, &result).await?;
    }

    match args.format {
        OutputFormat::Table => print_table(&ctx, &result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => print_plain(&result),
    }

    if result.is_clean() {
        return Ok(());
    }

    let failed = result.failed_jobs().count();
    let unpublished = result.publish_failures().count();
    Err(MatrixError::User(format!(
        "Run {} did not complete cleanly: {} of {} platform(s) failed, {} artifact(s) not published",
        result.run_id,
        failed,
        result.jobs.len(),
        unpublished
    )))
}

async fn write_report(path: &Path, result: &RunResult) -> MatrixResult<()> {
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| MatrixError::io(format!("writing report to {}", path.display()), e))
}

fn print_table(ctx: &UiContext, result: &RunResult) {
    ui::section(ctx, "Results");

    for report in &result.jobs {
        let job = &report.job;
        let summary = ui::summarize(job);

        match job.status() {
            JobStatus::Succeeded => ui::step_ok_detail(ctx, job.id(), &summary),
            _ => {
                let kind = job
                    .failure()
                    .map(|f| f.kind.to_string())
                    .unwrap_or_else(|| job.status().to_string());
                ui::step_error_detail(ctx, job.id(), &kind);
                if let Some(diagnostic) = job.diagnostic() {
                    ui::remark(ctx, diagnostic);
                }
            }
        }

        match report.publish {
            Some(PublishOutcome::Published(ref artifact)) => {
                ui::key_value("published", &artifact.location);
            }
            Some(PublishOutcome::Failed { ref name, ref reason }) => {
                ui::step_warn_hint(ctx, &format!("{} not published", name), reason);
            }
            None => {}
        }
    }

    let elapsed = result.elapsed().num_seconds();
    let summary = format!(
        "{} of {} platform(s) succeeded, {} from cache, {}s",
        result.jobs.len() - result.failed_jobs().count(),
        result.jobs.len(),
        result.cache_hits(),
        elapsed
    );

    if result.is_clean() {
        ui::outro_success(ctx, &summary);
    } else if result.succeeded() {
        ui::outro_warn(ctx, &summary);
    } else {
        ui::outro_error(ctx, &summary);
    }
}

fn print_plain(result: &RunResult) {
    for report in &result.jobs {
        let published = match report.publish {
            Some(PublishOutcome::Published(ref artifact)) => artifact.location.as_str(),
            Some(PublishOutcome::Failed { .. }) => "publish-failed",
            None => "-",
        };
        println!("{}\t{}\t{}", report.job.id(), report.job.status(), published);
    }
}
