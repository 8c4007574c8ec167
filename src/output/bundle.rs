//! Final packaging of shards into a single archive.
//!
//! Shards are stored as-is. Kernel-trace side files are merged first: the
//! viewer reads archive members in no particular order and requires one
//! monotonic kernel timeline, so multiple side files are concatenated in
//! name order (names follow creation order) into one merged file.

use crate::utils::config::{AUX_SUFFIX, MERGED_AUX_NAME};
use crate::utils::error::OutputError;
use log::{debug, info};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn is_aux(path: &Path) -> bool {
    path.to_string_lossy().ends_with(AUX_SUFFIX)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Concatenate side files, in the given order, into `dest`
///
/// **Public** - used by [`bundle`] and useful on its own for tests
pub fn merge_side_files(files: &[PathBuf], dest: &Path) -> Result<(), OutputError> {
    let mut out = BufWriter::new(File::create(dest)?);
    for file in files {
        debug!("Merging {} into {}", file.display(), dest.display());
        let mut input = BufReader::new(File::open(file)?);
        io::copy(&mut input, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

/// Bundle shards and side files into `<output_base>.zip`
///
/// **Public** - main entry point for packaging
///
/// # Arguments
/// * `targets` - Every file produced by the export, shards and side files
/// * `output_base` - Output path without extension
///
/// # Returns
/// Path of the archive
///
/// # Errors
/// * `OutputError::NoShards` - no trace shard among `targets`
/// * `OutputError::WriteFailed` - I/O error
/// * `OutputError::ArchiveFailed` - archive could not be written
pub fn bundle(targets: &[PathBuf], output_base: &Path) -> Result<PathBuf, OutputError> {
    let (mut side_files, shards): (Vec<&PathBuf>, Vec<&PathBuf>) =
        targets.iter().partition(|path| is_aux(path));

    if shards.is_empty() {
        return Err(OutputError::NoShards);
    }

    // A merged file left over from an earlier run is never an input
    side_files.retain(|path| file_name(path) != MERGED_AUX_NAME);

    let mut archive_name = OsString::from(output_base.as_os_str());
    archive_name.push(".zip");
    let archive_path = PathBuf::from(archive_name);

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    let mut zip = ZipWriter::new(File::create(&archive_path)?);

    let mut add = |path: &Path| -> Result<(), OutputError> {
        debug!("Adding {} to archive", path.display());
        zip.start_file(file_name(path), options)?;
        let mut input = BufReader::new(File::open(path)?);
        io::copy(&mut input, &mut zip)?;
        Ok(())
    };

    for shard in &shards {
        add(shard.as_path())?;
    }

    match side_files.as_slice() {
        [] => {}
        [single] => add(single.as_path())?,
        many => {
            let mut ordered: Vec<PathBuf> = many.iter().map(|p| p.to_path_buf()).collect();
            ordered.sort();
            let merged = ordered[0]
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(MERGED_AUX_NAME);
            merge_side_files(&ordered, &merged)?;
            add(merged.as_path())?;
        }
    }

    zip.finish()?;

    info!(
        "Bundled {} shards and {} side files into {}",
        shards.len(),
        side_files.len(),
        archive_path.display()
    );
    Ok(archive_path)
}
