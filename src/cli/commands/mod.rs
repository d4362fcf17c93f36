//! CLI command implementations

pub mod config;
pub mod create;
pub mod destroy;
pub mod validate;

pub use config::execute as config;
pub use create::execute as create;
pub use destroy::execute as destroy;
pub use validate::execute as validate;

use crate::config::Config;
use std::path::{Path, PathBuf};

/// `--dir` when given, otherwise `assets.dir` from the config
fn asset_dir(dir: Option<&Path>, config: &Config) -> PathBuf {
    dir.map(Path::to_path_buf)
        .unwrap_or_else(|| config.assets.dir.clone())
}
