//! Reading and writing of RON configuration files.

use anyhow::{Context, Result};
use ron::ser::PrettyConfig;
use serde::{Serialize, de::DeserializeOwned};
use std::{fs, path::Path};

/// Reads the RON (Rusty Object Notation) file at the given path and
/// deserializes the contents into an object of type `T`.
///
/// # Errors
/// Returns an error naming the path if the file can not be read or does not
/// hold a valid `T`.
pub fn parse_ron_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let file_path = file_path.as_ref();
    let text = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read {}", file_path.display()))?;
    ron::from_str(&text).with_context(|| format!("Invalid RON in {}", file_path.display()))
}

/// Serializes the given value to pretty-printed RON and writes it to the
/// given path, creating missing parent directories.
///
/// # Errors
/// Returns an error if serialization or any file system operation fails.
pub fn write_ron_file<T: Serialize>(value: &T, output_file_path: impl AsRef<Path>) -> Result<()> {
    let output_file_path = output_file_path.as_ref();
    if let Some(parent) = output_file_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create directory {}", parent.display()))?;
    }
    let text = ron::ser::to_string_pretty(value, PrettyConfig::new())
        .context("Could not serialize value to RON")?;
    fs::write(output_file_path, text)
        .with_context(|| format!("Could not write {}", output_file_path.display()))
}
