//! Terminal output
//!
//! Interactive terminals get cliclack framing and one indicatif spinner per
//! platform; CI and piped output fall back to plain `[OK]`/`[FAIL]` lines.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, outro_warn, print_error,
    remark, section, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{summarize, MatrixProgress};
pub use prompts::confirm;
