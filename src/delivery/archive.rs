// SPDX-License-Identifier: GPL-3.0-only
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zip::ZipArchive;

use crate::delivery::traits::DeliveryError;

/// Unpack a pack archive into `dest`, returning the number of files written.
///
/// Entries that would land outside `dest` abort the extraction. `cancel` is
/// checked between entries. The blocking job outlives an aborted caller, so on
/// any failure it removes `dest` itself before returning.
pub async fn extract_pack_archive(
    archive_path: &Path,
    dest: &Path,
    cancel: CancellationToken,
) -> Result<usize, DeliveryError> {
    debug!(archive = %archive_path.display(), dest = %dest.display(), "Extracting pack archive");

    tokio::fs::create_dir_all(dest).await?;

    let archive_path = archive_path.to_path_buf();
    let dest: PathBuf = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let result = unpack(&archive_path, &dest, &cancel);
        if result.is_err() {
            let _ = std::fs::remove_dir_all(&dest);
        }
        result
    })
    .await
    .map_err(|e| DeliveryError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

fn unpack(archive_path: &Path, dest: &Path, cancel: &CancellationToken) -> Result<usize, DeliveryError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut files = 0;

    for i in 0..archive.len() {
        if cancel.is_cancelled() {
            return Err(DeliveryError::Canceled);
        }

        let mut entry = archive.by_index(i)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => return Err(DeliveryError::UnsafeArchiveEntry(entry.name().to_string())),
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
            files += 1;
        }
    }

    if cancel.is_cancelled() {
        return Err(DeliveryError::Canceled);
    }
    Ok(files)
}

#[cfg(test)]
pub(crate) fn write_test_archive(path: &Path, contents: &[(&str, &[u8])]) {
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, data) in contents {
        zip.start_file(*name, FileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}
