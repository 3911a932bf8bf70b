//! Small helpers shared by the provisioner: map merging, lexical path
//! normalization and file writing.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;

use crate::error::{ProvisionerError, Result};

/// Deep merge `b` into a copy of `a`. Nested mappings are merged key by
/// key, any other value in `b` replaces the one in `a`. Neither input is
/// modified.
pub fn merge_dicts(a: &Mapping, b: &Mapping) -> Mapping {
    let mut merged = a.clone();
    for (key, value) in b {
        let replacement = match (merged.get(key), value) {
            (Some(Value::Mapping(left)), Value::Mapping(right)) => {
                Value::Mapping(merge_dicts(left, right))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), replacement);
    }
    merged
}

/// Join `path` onto `base` unless it is already absolute, then collapse
/// `.` and `..` components without touching the filesystem.
pub fn abs_path(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    normalize(&base.join(path.as_ref()))
}

pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // ".." above the root stays at the root
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Render a value the way every YAML artifact on disk is written.
pub fn safe_dump<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Write `content` to `path`, creating parent directories. The content
/// lands in a temporary sibling first and is renamed into place.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| ProvisionerError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| ProvisionerError::io(parent, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| ProvisionerError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| ProvisionerError::io(path, e.error))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
