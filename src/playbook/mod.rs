pub mod args;
pub mod runner;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use crate::config::{Action, EnvMap, PlaybooksConfig};
use crate::error::{ProvisionerError, Result};
use crate::provisioner::Ansible;
use crate::util;

pub use runner::{BakedCommand, PlaybookRunner, ProcessRunner, RecordingRunner, RunOutput};

pub const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";

/// Playbook path for every lifecycle phase, resolved against the scenario
/// directory. `None` means the phase has nothing to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playbooks {
    pub create: Option<PathBuf>,
    pub prepare: Option<PathBuf>,
    pub converge: Option<PathBuf>,
    pub side_effect: Option<PathBuf>,
    pub verify: Option<PathBuf>,
    pub cleanup: Option<PathBuf>,
    pub destroy: Option<PathBuf>,
}

impl Playbooks {
    pub fn resolve(scenario_dir: &Path, config: &PlaybooksConfig) -> Self {
        let configured = |value: &Option<String>| value.as_ref().map(|p| scenario_dir.join(p));
        let existing = |value: &Option<String>, default: &str| {
            configured(value).or_else(|| {
                let candidate = scenario_dir.join(default);
                candidate.is_file().then_some(candidate)
            })
        };

        Playbooks {
            create: existing(&config.create, "create.yml"),
            prepare: existing(&config.prepare, "prepare.yml"),
            converge: configured(&config.converge).or_else(|| Some(scenario_dir.join("converge.yml"))),
            side_effect: configured(&config.side_effect),
            verify: existing(&config.verify, "verify.yml"),
            cleanup: configured(&config.cleanup),
            destroy: existing(&config.destroy, "destroy.yml"),
        }
    }
}

/// One `ansible-playbook` invocation for a lifecycle phase.
#[derive(Debug, Clone)]
pub struct AnsiblePlaybook {
    playbook: Option<PathBuf>,
    action: Action,
    options: Mapping,
    converge: Option<PathBuf>,
    inventory_dir: PathBuf,
    cwd: PathBuf,
    ansible_args: Vec<String>,
    cli: Mapping,
    env: EnvMap,
    command: Option<BakedCommand>,
}

impl AnsiblePlaybook {
    /// Snapshot everything the invocation needs from `provisioner`. With
    /// `verify` set, the verifier environment is laid over the provisioner's.
    pub fn new(playbook: Option<PathBuf>, provisioner: &Ansible, verify: bool) -> Self {
        let config = provisioner.config();
        let mut env = provisioner.env();
        if verify {
            env.extend(config.data.verifier.env.clone());
        }

        let ansible_args = config
            .provisioner()
            .ansible_args
            .iter()
            .chain(config.ansible_args.iter())
            .cloned()
            .collect();

        AnsiblePlaybook {
            playbook,
            action: config.action,
            options: provisioner.options(),
            converge: provisioner.playbooks().converge,
            inventory_dir: provisioner.inventory_directory(),
            cwd: config.project_directory.clone(),
            ansible_args,
            cli: Mapping::new(),
            env,
            command: None,
        }
    }

    pub fn playbook(&self) -> Option<&Path> {
        self.playbook.as_deref()
    }

    pub fn env(&self) -> &EnvMap {
        &self.env
    }

    /// Add a per-invocation option. Falsy values are ignored.
    pub fn add_cli_arg(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if args::is_truthy(&value) {
            self.cli.insert(Value::from(name), value);
            self.command = None;
        }
    }

    pub fn add_env_arg(&mut self, name: &str, value: &str) {
        self.env.insert(name.to_string(), value.to_string());
        self.command = None;
    }

    /// Build the command line. Returns `None` when there is no playbook.
    pub fn bake(&mut self) -> Option<&BakedCommand> {
        if self.command.is_none() {
            let playbook = self.playbook.as_ref()?;

            let mut cli = self.cli.clone();
            cli.insert(
                Value::from("inventory"),
                Value::from(util::path_string(&self.inventory_dir)),
            );
            let mut options = util::merge_dicts(&self.options, &cli);
            let verbose = args::verbose_flag(&mut options);
            if self.converge.as_ref() != Some(playbook) {
                options.remove("become");
            }

            let mut command_args = args::dict2args(&options);
            command_args.extend(verbose);
            if !self.action.is_destructive() {
                command_args.extend(self.ansible_args.iter().cloned());
            }
            command_args.push(util::path_string(playbook));

            self.command = Some(BakedCommand {
                program: ANSIBLE_PLAYBOOK.to_string(),
                args: command_args,
                cwd: self.cwd.clone(),
                env: self.env.clone(),
            });
        }
        self.command.as_ref()
    }

    /// Run the playbook and return its stdout. A missing playbook is
    /// skipped with a warning.
    pub fn execute(&mut self, runner: &dyn PlaybookRunner) -> Result<Option<Vec<u8>>> {
        let action = self.action;
        let Some(command) = self.bake() else {
            warn!("Skipping, {} action has no playbook.", action);
            return Ok(None);
        };

        info!("Running {} for {}", ANSIBLE_PLAYBOOK, action);
        let output = runner.run(command)?;
        if output.code != 0 {
            return Err(ProvisionerError::PlaybookFailed {
                code: output.code,
                command: command.command_line(),
            });
        }
        debug!("{} produced {} bytes of output", ANSIBLE_PLAYBOOK, output.stdout.len());
        Ok(Some(output.stdout))
    }
}
