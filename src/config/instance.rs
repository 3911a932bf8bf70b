use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{ProvisionerError, Result};

/// One entry of `instance_config.yml`, written by create playbooks once
/// an instance is reachable.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InstanceEntry {
    pub instance: String,
    pub address: Option<String>,
    pub user: Option<String>,
    pub port: Option<Value>,
    pub identity_file: Option<String>,
    pub connection: Option<String>,
}

/// Load the instance config. A missing or empty file means no instance
/// has been created yet.
pub fn load(path: &Path) -> Result<Vec<InstanceEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No instance config at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(ProvisionerError::io(path, e)),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Option<Vec<InstanceEntry>> =
        serde_yaml::from_str(&content).map_err(|source| ProvisionerError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries.unwrap_or_default())
}

/// Ansible connection variables for `instance_name`, empty when the
/// instance is not listed.
pub fn ansible_connection_options(entries: &[InstanceEntry], instance_name: &str) -> Mapping {
    let mut options = Mapping::new();
    let Some(entry) = entries.iter().find(|e| e.instance == instance_name) else {
        return options;
    };

    let optional = |value: &Option<String>| match value {
        Some(v) => Value::String(v.clone()),
        None => Value::Null,
    };

    options.insert("ansible_user".into(), optional(&entry.user));
    options.insert("ansible_host".into(), optional(&entry.address));
    options.insert("ansible_port".into(), entry.port.clone().unwrap_or(Value::Null));
    options.insert(
        "ansible_connection".into(),
        Value::String(entry.connection.clone().unwrap_or_else(|| "smart".to_string())),
    );
    if let Some(identity_file) = &entry.identity_file {
        options.insert(
            "ansible_private_key_file".into(),
            Value::String(identity_file.clone()),
        );
    }
    options
}
