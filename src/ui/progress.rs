//! Live per-platform progress with CI fallback

use super::context::UiContext;
use crate::build::{BuildJob, JobStatus, RunObserver};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Longest output line shown next to a spinner
const MAX_MESSAGE_LEN: usize = 60;

enum Mode {
    Spinners(MultiProgress),
    Lines,
    /// Stdout is reserved for a json or plain report
    Silent,
}

/// One spinner per platform in interactive terminals, one line per
/// lifecycle event otherwise.
pub struct MatrixProgress {
    mode: Mode,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl MatrixProgress {
    pub fn new(ctx: &UiContext) -> Self {
        let mode = if ctx.machine_output() {
            Mode::Silent
        } else if ctx.use_fancy_output() {
            Mode::Spinners(MultiProgress::new())
        } else {
            Mode::Lines
        };

        Self {
            mode,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Whether lifecycle events produce any terminal output
    pub fn is_silent(&self) -> bool {
        matches!(self.mode, Mode::Silent)
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("  {spinner:.cyan} {prefix:.bold} {msg:.dim}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
    }

    fn with_bar(&self, platform_id: &str, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(platform_id) {
                f(bar);
            }
        }
    }

    /// Clear any spinners still on screen
    pub fn finish(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}

impl RunObserver for MatrixProgress {
    fn job_started(&self, platform_id: &str) {
        let multi = match self.mode {
            Mode::Spinners(ref multi) => multi,
            Mode::Lines => {
                println!("  {} {}", style("[..]").dim(), platform_id);
                return;
            }
            Mode::Silent => return,
        };

        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_prefix(platform_id.to_string());
        bar.set_message("starting");
        bar.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(platform_id.to_string(), bar);
        }
    }

    fn job_output(&self, platform_id: &str, line: &str) {
        if !matches!(self.mode, Mode::Spinners(_)) {
            return;
        }
        if let Some(message) = display_line(line) {
            self.with_bar(platform_id, |bar| bar.set_message(message));
        }
    }

    fn job_finished(&self, job: &BuildJob) {
        if self.is_silent() {
            return;
        }

        let summary = summarize(job);
        let removed = self.bars.lock().ok().and_then(|mut bars| bars.remove(job.id()));

        match removed {
            Some(bar) => {
                bar.set_style(
                    ProgressStyle::with_template("  {prefix:.bold} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                let mark = match job.status() {
                    JobStatus::Succeeded => style("✓").green(),
                    _ => style("✗").red(),
                };
                bar.finish_with_message(format!("{} {}", mark, summary));
            }
            None => {
                let tag = match job.status() {
                    JobStatus::Succeeded => style("[OK]").green(),
                    _ => style("[FAIL]").red(),
                };
                println!("  {} {} {}", tag, job.id(), summary);
            }
        }
    }
}

/// Short outcome text: elapsed time, cache use, failure kind
pub fn summarize(job: &BuildJob) -> String {
    let elapsed = job
        .elapsed()
        .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_else(|| "-".to_string());

    match job.failure() {
        Some(failure) => format!("({}, {})", failure.kind, elapsed),
        None if job.cache_hit() => format!("({}, cached)", elapsed),
        None => format!("({})", elapsed),
    }
}

/// Reduce an engine output line to something worth showing next to a spinner
fn display_line(line: &str) -> Option<String> {
    if let Some((n, total, instruction)) = parse_step_line(line) {
        return Some(format!("step {}/{}: {}", n, total, truncate(instruction)));
    }

    let trimmed = line.trim();
    if trimmed.is_empty() || is_build_noise(trimmed) {
        return None;
    }
    Some(truncate(trimmed))
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_LEN {
        let head: String = text.chars().take(MAX_MESSAGE_LEN - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Engine bookkeeping lines that say nothing about build progress
fn is_build_noise(line: &str) -> bool {
    line.starts_with("-->")
        || line.starts_with("Removing intermediate")
        || line.starts_with("COMMIT")
        || line.starts_with("Successfully tagged")
}

/// Parse an image build step line like `STEP N/M: INSTRUCTION args...`
fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    let rest = line.strip_prefix("STEP ")?;
    let (counts, instruction) = rest.split_once(':')?;
    let (n, total) = counts.split_once('/')?;
    Some((n.parse().ok()?, total.parse().ok()?, instruction.trim()))
}
