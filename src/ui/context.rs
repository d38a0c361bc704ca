//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// Environment variables set by common CI providers
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Decides between spinners and plain line output
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
    machine_output: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: detect_interactive(),
            auto_yes: false,
            machine_output: false,
        }
    }

    /// Plain output, no prompts
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
            machine_output: false,
        }
    }

    /// Auto-approve confirmation prompts (`--yes`)
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Stdout carries a machine-readable document: no spinners, no progress lines
    pub fn with_plain(mut self, plain: bool) -> Self {
        if plain {
            self.interactive = false;
            self.machine_output = true;
        }
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    pub fn machine_output(&self) -> bool {
        self.machine_output
    }

    /// Spinners and cliclack framing
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

fn detect_interactive() -> bool {
    if !std::io::stdout().is_terminal() || !std::io::stdin().is_terminal() {
        return false;
    }

    !CI_VARS.iter().any(|var| std::env::var_os(var).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.auto_yes());
    }

    #[test]
    fn plain_disables_fancy_output() {
        let ctx = UiContext {
            interactive: true,
            auto_yes: false,
            machine_output: false,
        };
        assert!(ctx.use_fancy_output());
        assert!(!ctx.machine_output());

        let plain = ctx.with_plain(true);
        assert!(!plain.use_fancy_output());
        assert!(plain.machine_output());
    }

    #[test]
    fn with_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(ctx.auto_yes());
    }
}
