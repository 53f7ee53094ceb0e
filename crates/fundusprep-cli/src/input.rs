//! Input discovery and output path layout
//!
//! Enumerates the photographs in an input directory and maps each one
//! to its processed-image and mask destinations.

use fundusprep_core::decoders;
use std::path::{Path, PathBuf};

/// List the supported image files in a directory, sorted by file name.
///
/// Subdirectories and files with unsupported extensions are skipped.
/// Sorting keeps batch ordering (and progress output) deterministic
/// regardless of directory iteration order.
pub fn list_input_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, String> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("Failed to read input directory {}: {}", dir.display(), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| format!("Failed to read entry in {}: {}", dir.display(), e))?;
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(decoders::is_supported_extension)
            .unwrap_or(false);
        if path.is_file() && supported {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Remove a directory tree if it exists and create it fresh.
///
/// Output directories are wiped at the start of every run so stale
/// results from a previous batch cannot be mistaken for current ones.
pub fn recreate_dir<P: AsRef<Path>>(dir: P) -> Result<(), String> {
    let dir = dir.as_ref();

    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| format!("Failed to remove directory {}: {}", dir.display(), e))?;
    }

    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))
}

/// Destination for the processed image: same file name as the input,
/// placed directly in the output directory.
pub fn image_output_path(input: &Path, output_dir: &Path) -> Result<PathBuf, String> {
    let name = input
        .file_name()
        .ok_or_else(|| format!("Input path {} has no file name", input.display()))?;
    Ok(output_dir.join(name))
}

/// Destination for the eye-region mask: the input's stem with a `.png`
/// extension, placed in the masks directory.
pub fn mask_output_path(input: &Path, masks_dir: &Path) -> Result<PathBuf, String> {
    let stem = input
        .file_stem()
        .ok_or_else(|| format!("Input path {} has no file stem", input.display()))?;
    let mut name = stem.to_os_string();
    name.push(".png");
    Ok(masks_dir.join(name))
}
