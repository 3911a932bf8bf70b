pub mod instance;
pub mod provisioner;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{ProvisionerError, Result};
use crate::util;
pub use provisioner::{InventoryConfig, PlaybooksConfig, ProvisionerConfig};
use provisioner::null_as_default;

/// Environment variables as an ordered name → value map.
pub type EnvMap = BTreeMap<String, String>;

pub const INVENTORY_FILE_NAME: &str = "ansible_inventory.yml";
pub const CONFIG_FILE_NAME: &str = "ansible.cfg";
pub const INSTANCE_CONFIG_FILE_NAME: &str = "instance_config.yml";

/// The scenario step currently being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Prepare,
    Converge,
    Idempotence,
    SideEffect,
    Verify,
    Cleanup,
    Destroy,
    Check,
    Syntax,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Prepare => "prepare",
            Action::Converge => "converge",
            Action::Idempotence => "idempotence",
            Action::SideEffect => "side_effect",
            Action::Verify => "verify",
            Action::Cleanup => "cleanup",
            Action::Destroy => "destroy",
            Action::Check => "check",
            Action::Syntax => "syntax",
        }
    }

    /// Create and destroy run playbooks the user usually did not write, so
    /// they never receive user options or extra arguments.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Action::Create | Action::Destroy)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "create" => Ok(Action::Create),
            "prepare" => Ok(Action::Prepare),
            "converge" => Ok(Action::Converge),
            "idempotence" => Ok(Action::Idempotence),
            "side_effect" => Ok(Action::SideEffect),
            "verify" => Ok(Action::Verify),
            "cleanup" => Ok(Action::Cleanup),
            "destroy" => Ok(Action::Destroy),
            "check" => Ok(Action::Check),
            "syntax" => Ok(Action::Syntax),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Platform {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverSection {
    #[serde(default = "default_driver")]
    pub name: String,
}

impl Default for DriverSection {
    fn default() -> Self {
        DriverSection {
            name: default_driver(),
        }
    }
}

fn default_driver() -> String {
    "delegated".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifierSection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: EnvMap,
}

/// A parsed `molecule.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub driver: DriverSection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub platforms: Vec<Platform>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provisioner: ProvisionerConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenario: ScenarioSection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub verifier: VerifierSection,
}

impl ScenarioFile {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(ScenarioFile::default());
        }
        let parsed: Option<ScenarioFile> =
            serde_yaml::from_str(text).map_err(|source| ProvisionerError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed.unwrap_or_default())
    }
}

/// Everything the provisioner would otherwise read from the process:
/// its environment, the home directory and the data directory.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    pub os_env: EnvMap,
    pub home_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl RuntimeContext {
    pub fn from_process() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        let data_dir = dirs::data_dir().unwrap_or_else(|| home_dir.join(".local").join("share"));
        RuntimeContext {
            os_env: std::env::vars().collect(),
            home_dir,
            data_dir,
        }
    }

    /// Value of `key` in the captured environment, ignoring empty values.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.os_env.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Expand `$VAR`, `${VAR}` and `${VAR:-default}` against `env`. Unknown
/// variables without a default are left untouched.
pub fn interpolate(text: &str, env: &EnvMap) -> String {
    shellexpand::env_with_context_no_errors(text, |name| env.get(name)).into_owned()
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub directory: PathBuf,
    pub ephemeral_directory: PathBuf,
}

impl Scenario {
    pub fn inventory_directory(&self) -> PathBuf {
        self.ephemeral_directory.join("inventory")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub molecule_file: PathBuf,
    pub project_directory: PathBuf,
    /// Runtime cache shared by every scenario of the project.
    pub cache_dir: PathBuf,
    pub scenario: Scenario,
    pub data: ScenarioFile,
    pub runtime: RuntimeContext,
    pub action: Action,
    pub debug: bool,
    /// Extra `ansible-playbook` arguments given on the command line.
    pub ansible_args: Vec<String>,
}

impl Config {
    /// Read, interpolate and parse the scenario file at `molecule_file`.
    pub fn load(molecule_file: &Path, runtime: RuntimeContext) -> Result<Self> {
        info!("Loading scenario file: {}", molecule_file.display());
        let raw = fs::read_to_string(molecule_file)
            .map_err(|e| ProvisionerError::io(molecule_file, e))?;
        let text = interpolate(&raw, &runtime.os_env);
        let data = ScenarioFile::parse(molecule_file, &text)?;
        Ok(Config::new(molecule_file, data, runtime))
    }

    /// Derive every scenario path from the scenario file location, which
    /// is expected at `<project>/molecule/<scenario>/molecule.yml`.
    pub fn new(molecule_file: &Path, data: ScenarioFile, runtime: RuntimeContext) -> Self {
        let molecule_file = util::normalize(molecule_file);
        let directory = molecule_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let project_directory = directory
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| directory.clone());

        let name = data
            .scenario
            .name
            .clone()
            .unwrap_or_else(|| file_name(&directory));
        let project_name = file_name(&project_directory);

        let cache_root = match runtime.var("XDG_CACHE_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => runtime.home_dir.join(".cache"),
        };
        let ephemeral_directory = match runtime.var("MOLECULE_EPHEMERAL_DIRECTORY") {
            Some(dir) => util::abs_path(&project_directory, dir),
            None => cache_root.join("molecule").join(&project_name).join(&name),
        };
        let cache_dir = cache_root.join("ansible-compat").join(&project_name);

        debug!(
            "Scenario '{}' uses ephemeral directory {}",
            name,
            ephemeral_directory.display()
        );

        Config {
            molecule_file,
            project_directory,
            cache_dir,
            scenario: Scenario {
                name,
                directory,
                ephemeral_directory,
            },
            data,
            runtime,
            action: Action::Converge,
            debug: false,
            ansible_args: Vec::new(),
        }
    }

    pub fn provisioner(&self) -> &ProvisionerConfig {
        &self.data.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut ProvisionerConfig {
        &mut self.data.provisioner
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.data.platforms
    }

    pub fn inventory_file(&self) -> PathBuf {
        self.scenario.inventory_directory().join(INVENTORY_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.scenario.ephemeral_directory.join(CONFIG_FILE_NAME)
    }

    pub fn instance_config(&self) -> PathBuf {
        self.scenario.ephemeral_directory.join(INSTANCE_CONFIG_FILE_NAME)
    }

    /// Variables describing the scenario to playbooks.
    pub fn molecule_env(&self) -> EnvMap {
        let path = |p: PathBuf| util::path_string(&p);
        let mut env = EnvMap::new();
        env.insert("MOLECULE_DEBUG".into(), self.debug.to_string());
        env.insert("MOLECULE_FILE".into(), path(self.molecule_file.clone()));
        env.insert("MOLECULE_INVENTORY_FILE".into(), path(self.inventory_file()));
        env.insert(
            "MOLECULE_EPHEMERAL_DIRECTORY".into(),
            path(self.scenario.ephemeral_directory.clone()),
        );
        env.insert(
            "MOLECULE_SCENARIO_DIRECTORY".into(),
            path(self.scenario.directory.clone()),
        );
        env.insert(
            "MOLECULE_PROJECT_DIRECTORY".into(),
            path(self.project_directory.clone()),
        );
        env.insert("MOLECULE_INSTANCE_CONFIG".into(), path(self.instance_config()));
        env.insert("MOLECULE_DRIVER_NAME".into(), self.data.driver.name.clone());
        env.insert(
            "MOLECULE_PROVISIONER_NAME".into(),
            self.data.provisioner.name.clone(),
        );
        env.insert("MOLECULE_SCENARIO_NAME".into(), self.scenario.name.clone());
        env
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}
