use std::path::Path;

use log::info;

use stratum_api::{
    config::StorageLayout,
    error::{InvalidInputError, StratumError, StratumResultExt},
};

/// Loads a storage layout file and checks it without touching the host.
pub fn validate_layout_file(path: impl AsRef<Path>) -> Result<StorageLayout, StratumError> {
    let path = path.as_ref();
    info!("Validating storage layout: {}", path.display());

    let layout = StorageLayout::load(path)?;
    layout
        .validate()
        .map_err(|e| StratumError::new(InvalidInputError::from(e)))
        .message(format!("Storage layout '{}' is invalid", path.display()))?;

    info!("Storage layout '{}' is valid", layout.name);
    Ok(layout)
}
