use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Mapping;
use std::collections::BTreeMap;

/// The `provisioner` section of a scenario file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisionerConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inventory: InventoryConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config_options: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub connection_options: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub playbooks: PlaybooksConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ansible_args: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        ProvisionerConfig {
            name: default_name(),
            options: Mapping::new(),
            env: BTreeMap::new(),
            inventory: InventoryConfig::default(),
            config_options: Mapping::new(),
            connection_options: Mapping::new(),
            playbooks: PlaybooksConfig::default(),
            ansible_args: Vec::new(),
        }
    }
}

fn default_name() -> String {
    "ansible".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InventoryConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hosts: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub host_vars: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_vars: Mapping,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: BTreeMap<String, String>,
}

/// Playbook paths as written by the user, relative to the scenario directory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlaybooksConfig {
    pub create: Option<String>,
    pub prepare: Option<String>,
    pub converge: Option<String>,
    pub side_effect: Option<String>,
    pub verify: Option<String>,
    pub cleanup: Option<String>,
    pub destroy: Option<String>,
}

/// `key:` with no value parses as null; treat it like an absent key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
