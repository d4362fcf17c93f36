//! Ignition configs and the pieces used to build them

pub mod aio;
pub mod bootstrap;
pub mod dataurl;
pub mod expiry;
pub mod files;
pub mod machine;
pub mod render;
pub mod types;

pub use aio::Aio;
pub use bootstrap::Bootstrap;
pub use machine::{MasterIgnition, WorkerIgnition};
pub use types::Config;

use crate::asset::{AssetFile, FileFetcher};
use crate::error::{KvinstallError, KvinstallResult};

/// Read and parse a stored `*.ign` file. `Ok(None)` when absent.
pub(crate) fn load_config(
    fetcher: &dyn FileFetcher,
    filename: &str,
    asset: &str,
) -> KvinstallResult<Option<(Config, AssetFile)>> {
    let Some(file) = fetcher.fetch_by_name(filename)? else {
        return Ok(None);
    };

    let config = Config::unmarshal(&file.data).map_err(|e| KvinstallError::AssetLoad {
        asset: asset.to_string(),
        filename: filename.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some((config, file)))
}
