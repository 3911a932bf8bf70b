use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use log::debug;

use super::Ansible;
use crate::config::EnvMap;
use crate::error::{ProvisionerError, Result};
use crate::util::{abs_path, path_string};

pub const ANSIBLE_CONFIG: &str = "ANSIBLE_CONFIG";
pub const ANSIBLE_ROLES_PATH: &str = "ANSIBLE_ROLES_PATH";
pub const ANSIBLE_LIBRARY: &str = "ANSIBLE_LIBRARY";
pub const ANSIBLE_FILTER_PLUGINS: &str = "ANSIBLE_FILTER_PLUGINS";
pub const ANSIBLE_COLLECTIONS_PATH: &str = "ANSIBLE_COLLECTIONS_PATH";

const COLLECTIONS_ROOT: &str = "ansible_collections";

/// Keys whose user values extend the default search path instead of
/// replacing it.
const APPENDED_KEYS: [&str; 3] = [ANSIBLE_ROLES_PATH, ANSIBLE_LIBRARY, ANSIBLE_FILTER_PLUGINS];

fn join_paths<I, S>(paths: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths.into_iter().map(|p| p.as_ref().to_string()).join(":")
}

impl Ansible {
    /// Colon separated entries of `key` in the captured OS environment,
    /// relative entries resolved against the scenario directory.
    fn os_env_paths(&self, key: &str) -> Vec<String> {
        let config = self.config();
        config
            .runtime
            .var(key)
            .map(|value| {
                value
                    .split(':')
                    .filter(|p| !p.is_empty())
                    .map(|p| path_string(&abs_path(&config.scenario.directory, p)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn home_path(&self, parts: &[&str]) -> String {
        let mut path = self.config().runtime.home_dir.clone();
        path.extend(parts);
        path_string(&path)
    }

    /// Built-in directory shipped alongside the provisioner.
    pub fn directory(&self) -> PathBuf {
        self.config()
            .runtime
            .data_dir
            .join("molecule")
            .join("provisioner")
            .join("ansible")
    }

    pub fn plugin_directory(&self) -> PathBuf {
        self.directory().join("plugins")
    }

    pub fn filter_plugin_directory(&self) -> PathBuf {
        self.plugin_directory().join("filter")
    }

    /// Module search path: built-in and scenario directories, then the OS
    /// `ANSIBLE_LIBRARY`, then the per-user and system-wide locations.
    pub fn modules_directories(&self) -> Vec<String> {
        let config = self.config();
        let mut paths = vec![
            path_string(&self.plugin_directory().join("modules")),
            path_string(&config.scenario.ephemeral_directory.join("library")),
            path_string(&config.project_directory.join("library")),
        ];
        // OS entries go after the scenario dirs so scenario modules shadow them.
        paths.extend(self.os_env_paths(ANSIBLE_LIBRARY));
        paths.push(self.home_path(&[".ansible", "plugins", "modules"]));
        paths.push("/usr/share/ansible/plugins/modules".to_string());
        paths
    }

    pub fn filter_plugin_directories(&self) -> Vec<String> {
        let config = self.config();
        let mut paths = vec![
            path_string(&self.filter_plugin_directory()),
            path_string(&config.scenario.ephemeral_directory.join("plugins").join("filter")),
            path_string(&config.project_directory.join("plugins").join("filter")),
            self.home_path(&[".ansible", "plugins", "filter"]),
            "/usr/share/ansible/plugins/filter".to_string(),
        ];
        paths.extend(self.os_env_paths(ANSIBLE_FILTER_PLUGINS));
        paths
    }

    pub fn roles_directories(&self) -> Vec<String> {
        let config = self.config();
        let mut paths = vec![
            path_string(&config.cache_dir.join("roles")),
            path_string(&config.scenario.ephemeral_directory.join("roles")),
            path_string(&abs_path(&config.project_directory, "..")),
            self.home_path(&[".ansible", "roles"]),
            "/usr/share/ansible/roles".to_string(),
            "/etc/ansible/roles".to_string(),
        ];
        paths.extend(self.os_env_paths(ANSIBLE_ROLES_PATH));
        paths
    }

    /// Collection search path. A project living inside an
    /// `ansible_collections` tree gets that tree searched first.
    pub fn collections_directories(&self) -> Vec<String> {
        let config = self.config();
        let mut paths = Vec::new();
        if let Some(root) = collections_root(&config.project_directory) {
            debug!("Project is part of the collections tree at {}", root.display());
            paths.push(path_string(&root));
        }
        paths.extend([
            path_string(&config.scenario.ephemeral_directory.join("collections")),
            self.home_path(&[".ansible", "collections"]),
            "/usr/share/ansible/collections".to_string(),
            "/etc/ansible/collections".to_string(),
        ]);
        paths.extend(self.os_env_paths(ANSIBLE_COLLECTIONS_PATH));
        paths
    }

    /// OS environment plus the scenario variables and the default search
    /// paths.
    pub fn default_env(&self) -> EnvMap {
        let config = self.config();
        let mut env = config.runtime.os_env.clone();
        env.extend(config.molecule_env());
        env.insert(ANSIBLE_CONFIG.into(), path_string(&self.config_file()));
        env.insert(ANSIBLE_ROLES_PATH.into(), join_paths(self.roles_directories()));
        env.insert(
            ANSIBLE_COLLECTIONS_PATH.into(),
            join_paths(self.collections_directories()),
        );
        env.insert(ANSIBLE_LIBRARY.into(), join_paths(self.modules_directories()));
        env.insert(
            ANSIBLE_FILTER_PLUGINS.into(),
            join_paths(self.filter_plugin_directories()),
        );
        env
    }

    /// Environment for `ansible-playbook`: the defaults overlaid with the
    /// user's `env`, except that search paths are extended rather than
    /// replaced and `ANSIBLE_CONFIG` always points at the generated file.
    pub fn env(&self) -> EnvMap {
        let default_env = self.default_env();
        let user_env = &self.config().provisioner().env;

        let mut env = default_env.clone();
        env.extend(user_env.clone());

        for key in APPENDED_KEYS {
            let mut value = default_env.get(key).cloned().unwrap_or_default();
            if let Ok(extra) = self.absolute_path_for(user_env, key) {
                value = format!("{}:{}", value, extra);
            }
            env.insert(key.to_string(), value);
        }
        env.insert(ANSIBLE_CONFIG.into(), path_string(&self.config_file()));
        env
    }

    /// Resolve every colon separated entry of `env[key]` against the
    /// scenario directory.
    pub fn absolute_path_for(&self, env: &EnvMap, key: &str) -> Result<String> {
        let value = env
            .get(key)
            .ok_or_else(|| ProvisionerError::MissingEnvKey(key.to_string()))?;
        let scenario_dir = &self.config().scenario.directory;
        Ok(join_paths(
            value.split(':').map(|p| path_string(&abs_path(scenario_dir, p))),
        ))
    }
}

fn collections_root(project_dir: &Path) -> Option<PathBuf> {
    let mut root = PathBuf::new();
    for component in project_dir.components() {
        if matches!(component, Component::Normal(name) if name == COLLECTIONS_ROOT) {
            return Some(root);
        }
        root.push(component.as_os_str());
    }
    None
}
