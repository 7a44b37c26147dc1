use std::{io::SeekFrom, path::Path};

use anyhow::{Context, Error};
use log::{debug, info};
use tokio::{
    fs::OpenOptions,
    io::{AsyncSeekExt, AsyncWriteExt},
};

use stratum_api::constants::FILL_ZERO_CHUNK_SIZE;

/// Overwrites every byte of `path` with zeroes and flushes it to the device.
///
/// The size is taken by seeking to the end, which works for both block
/// devices and regular files.
pub async fn fill_zero(path: &Path) -> Result<u64, Error> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open '{}' for writing", path.display()))?;

    let size = file
        .seek(SeekFrom::End(0))
        .await
        .with_context(|| format!("Failed to get size of '{}'", path.display()))?;
    file.seek(SeekFrom::Start(0))
        .await
        .with_context(|| format!("Failed to rewind '{}'", path.display()))?;

    info!("Filling '{}' with {size} zero bytes", path.display());
    let zeroes = vec![0u8; FILL_ZERO_CHUNK_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let chunk = remaining.min(FILL_ZERO_CHUNK_SIZE as u64) as usize;
        file.write_all(&zeroes[..chunk])
            .await
            .with_context(|| format!("Failed to write zeroes to '{}'", path.display()))?;
        remaining -= chunk as u64;
    }

    file.flush().await?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync '{}'", path.display()))?;
    debug!("Zeroed {size} bytes of '{}'", path.display());

    Ok(size)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_fill_zero() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let len = FILL_ZERO_CHUNK_SIZE + 4097;
        file.write_all(&vec![0xa5; len]).unwrap();
        file.flush().unwrap();

        assert_eq!(fill_zero(file.path()).await.unwrap(), len as u64);

        let contents = std::fs::read(file.path()).unwrap();
        assert_eq!(contents.len(), len);
        assert!(contents.iter().all(|b| *b == 0));
    }

    #[tokio::test]
    async fn test_fill_zero_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(fill_zero(file.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fill_zero_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = fill_zero(&dir.path().join("missing")).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to open"));
    }
}
