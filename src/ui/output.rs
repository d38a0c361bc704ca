//! Output functions for consistent CLI formatting

use super::context::UiContext;
use crate::error::MatrixError;
use console::style;

#[derive(Clone, Copy)]
enum Level {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Level {
    fn tag(self) -> console::StyledObject<&'static str> {
        match self {
            Self::Ok => style("[OK]").green(),
            Self::Warn => style("[WARN]").yellow(),
            Self::Fail => style("[FAIL]").red(),
            Self::Info => style("[INFO]").cyan(),
        }
    }
}

fn step(ctx: &UiContext, level: Level, message: String) {
    if ctx.use_fancy_output() {
        let _ = match level {
            Level::Ok => cliclack::log::success(message),
            Level::Warn => cliclack::log::warning(message),
            Level::Fail => cliclack::log::error(message),
            Level::Info => cliclack::log::info(message),
        };
    } else {
        println!("  {} {}", level.tag(), message);
    }
}

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

fn outro(ctx: &UiContext, level: Level, message: &str) {
    if ctx.use_fancy_output() {
        let styled = match level {
            Level::Ok => style(message).green().bold(),
            Level::Fail => style(message).red().bold(),
            _ => style(message).yellow().bold(),
        };
        cliclack::outro(styled).ok();
    } else {
        println!();
        println!("{} {}", level.tag(), message);
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    outro(ctx, Level::Ok, message);
}

pub fn outro_error(ctx: &UiContext, message: &str) {
    outro(ctx, Level::Fail, message);
}

pub fn outro_warn(ctx: &UiContext, message: &str) {
    outro(ctx, Level::Warn, message);
}

/// Display a section header
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, Level::Ok, message.to_string());
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Ok, format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step(ctx, Level::Warn, format!("{} - {}", message, style(hint).dim()));
}

pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Fail, format!("{}: {}", message, detail));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Level::Info, message.to_string());
}

/// Dimmed follow-up text, e.g. a diagnostic tail
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        for line in message.lines() {
            println!("      {}", style(line).dim());
        }
    }
}

pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.use_fancy_output() {
        let value = if ok {
            style(value).green()
        } else {
            style(value).yellow()
        };
        println!("  {}: {}", style(key).dim(), value);
    } else {
        let level = if ok { Level::Ok } else { Level::Warn };
        println!("  {} {}: {}", level.tag(), key, value);
    }
}

/// Print a fatal error and its hint to stderr
pub fn print_error(error: &MatrixError) {
    eprintln!("{} {}", style("Error:").red().bold(), error);
    if let Some(hint) = error.hint() {
        eprintln!("{} {}", style("Hint:").yellow(), hint);
    }
}
