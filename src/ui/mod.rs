//! Terminal output for commands
//!
//! Uses `cliclack` on an interactive terminal and falls back to plain,
//! prefix-tagged lines in CI and when output is piped.
//!
//! ```rust,ignore
//! use kvinstall::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "Creating manifests");
//! ui::step_ok(&ctx, "manifests/cluster-config.yaml");
//! ui::outro_success(&ctx, "Wrote 1 files");
//! ```

mod context;
mod output;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_success, step_info, step_ok, step_ok_detail, step_warn_hint,
};
