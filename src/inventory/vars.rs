use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::{Mapping, Value};

use crate::error::{ProvisionerError, Result};
use crate::util;

pub const HOSTS_FILE: &str = "hosts";
pub const HOST_VARS_DIR: &str = "host_vars";
pub const GROUP_VARS_DIR: &str = "group_vars";

/// Write the extra `hosts` inventory source plus one variables file per
/// host and per group. Nothing is created for empty sections.
pub fn add_or_update_vars(
    inventory_dir: &Path,
    hosts: &Mapping,
    host_vars: &Mapping,
    group_vars: &Mapping,
) -> Result<()> {
    if !hosts.is_empty() {
        let hosts_file = inventory_dir.join(HOSTS_FILE);
        util::write_file(&hosts_file, &util::safe_dump(hosts)?)?;
    }

    for (target, vars) in [(HOST_VARS_DIR, host_vars), (GROUP_VARS_DIR, group_vars)] {
        if vars.is_empty() {
            continue;
        }

        let vars_dir = inventory_dir.join(target);
        fs::create_dir_all(&vars_dir).map_err(|e| ProvisionerError::io(&vars_dir, e))?;

        for (name, content) in vars {
            let path = vars_dir.join(key_name(name));
            util::write_file(&path, &util::safe_dump(content)?)?;
        }
        info!("Wrote {} {} file(s)", vars.len(), target);
    }

    Ok(())
}

/// Remove `hosts`, `host_vars` and `group_vars`. Links and files are
/// unlinked, real directories are removed with their contents.
pub fn remove_vars(inventory_dir: &Path) -> Result<()> {
    for name in [HOSTS_FILE, GROUP_VARS_DIR, HOST_VARS_DIR] {
        let path = inventory_dir.join(name);
        let Ok(metadata) = fs::symlink_metadata(&path) else {
            continue;
        };

        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| ProvisionerError::io(&path, e))?;
        debug!("Removed {}", path.display());
    }
    Ok(())
}

/// Symlink every `target → source` pair into the inventory directory.
/// Sources are relative to the scenario directory and must exist.
pub fn link_or_update_vars(
    inventory_dir: &Path,
    scenario_dir: &Path,
    links: &BTreeMap<String, String>,
) -> Result<()> {
    if !links.is_empty() {
        fs::create_dir_all(inventory_dir).map_err(|e| ProvisionerError::io(inventory_dir, e))?;
    }

    for (name, source) in links {
        let target = inventory_dir.join(name);
        let source = scenario_dir.join(source);
        if !source.exists() {
            return Err(ProvisionerError::SourcePathMissing(source));
        }

        debug!("Inventory {} linked to {}", source.display(), target.display());
        symlink(&source, &target).map_err(|e| ProvisionerError::io(&target, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

fn key_name(key: &Value) -> PathBuf {
    match key {
        Value::String(s) => PathBuf::from(s),
        other => PathBuf::from(
            serde_yaml::to_string(other)
                .unwrap_or_default()
                .trim_end()
                .to_string(),
        ),
    }
}
