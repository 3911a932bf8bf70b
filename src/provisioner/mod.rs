//! The Ansible provisioner: turns a scenario's configuration into an
//! `ansible.cfg`, an inventory directory and `ansible-playbook` runs for
//! each lifecycle phase.

mod config_file;
pub mod env;
pub mod idempotence;
pub mod options;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_yaml::Mapping;

use crate::config::{instance, Config};
use crate::error::{ProvisionerError, Result};
use crate::inventory::{self, vars};
use crate::playbook::{AnsiblePlaybook, PlaybookRunner, Playbooks, ProcessRunner};
use crate::util;

pub struct Ansible {
    config: Config,
    runner: Box<dyn PlaybookRunner>,
}

impl Ansible {
    pub fn new(config: Config) -> Self {
        Ansible::with_runner(config, Box::new(ProcessRunner))
    }

    pub fn with_runner(config: Config, runner: Box<dyn PlaybookRunner>) -> Self {
        Ansible { config, runner }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn name(&self) -> &str {
        &self.config.provisioner().name
    }

    pub fn inventory_directory(&self) -> PathBuf {
        self.config.scenario.inventory_directory()
    }

    pub fn inventory_file(&self) -> PathBuf {
        self.config.inventory_file()
    }

    pub fn config_file(&self) -> PathBuf {
        self.config.config_file()
    }

    pub fn playbooks(&self) -> Playbooks {
        Playbooks::resolve(&self.config.scenario.directory, &self.config.provisioner().playbooks)
    }

    pub fn hosts(&self) -> &Mapping {
        &self.config.provisioner().inventory.hosts
    }

    pub fn host_vars(&self) -> &Mapping {
        &self.config.provisioner().inventory.host_vars
    }

    pub fn group_vars(&self) -> &Mapping {
        &self.config.provisioner().inventory.group_vars
    }

    pub fn links(&self) -> &BTreeMap<String, String> {
        &self.config.provisioner().inventory.links
    }

    /// Connection variables for `instance_name`: whatever the create
    /// playbook recorded for it, overridden by `connection_options`.
    pub fn connection_options(&self, instance_name: &str) -> Result<Mapping> {
        let instances = instance::load(&self.config.instance_config())?;
        Ok(self.merged_connection_options(&instances, instance_name))
    }

    fn merged_connection_options(
        &self,
        instances: &[instance::InstanceEntry],
        instance_name: &str,
    ) -> Mapping {
        util::merge_dicts(
            &instance::ansible_connection_options(instances, instance_name),
            &self.config.provisioner().connection_options,
        )
    }

    /// The inventory document for every declared platform.
    pub fn inventory(&self) -> Result<Mapping> {
        let instances = instance::load(&self.config.instance_config())?;
        Ok(inventory::build(self.config.platforms(), |name| {
            self.merged_connection_options(&instances, name)
        }))
    }

    pub fn verify_inventory(&self) -> Result<()> {
        if self.config.platforms().is_empty() {
            return Err(ProvisionerError::MissingPlatforms);
        }
        Ok(())
    }

    pub fn write_inventory(&self) -> Result<()> {
        self.verify_inventory()?;
        let path = self.inventory_file();
        util::write_file(&path, &util::safe_dump(&self.inventory()?)?)?;
        info!("Inventory written to {}", path.display());
        Ok(())
    }

    pub fn write_config(&self) -> Result<()> {
        let path = self.config_file();
        util::write_file(&path, &config_file::render(&self.config_options())?)?;
        info!("Ansible config written to {}", path.display());
        Ok(())
    }

    /// Regenerate the inventory directory: the inventory file, then either
    /// the declared links or the inline `hosts` and variable files.
    pub fn manage_inventory(&self) -> Result<()> {
        self.write_inventory()?;
        self.remove_vars()?;
        if self.links().is_empty() {
            self.add_or_update_vars()
        } else {
            self.link_or_update_vars()
        }
    }

    pub fn add_or_update_vars(&self) -> Result<()> {
        vars::add_or_update_vars(
            &self.inventory_directory(),
            self.hosts(),
            self.host_vars(),
            self.group_vars(),
        )
    }

    pub fn remove_vars(&self) -> Result<()> {
        vars::remove_vars(&self.inventory_directory())
    }

    pub fn link_or_update_vars(&self) -> Result<()> {
        vars::link_or_update_vars(
            &self.inventory_directory(),
            &self.config.scenario.directory,
            self.links(),
        )
    }

    fn run_playbook(
        &self,
        playbook: Option<PathBuf>,
        verify: bool,
        flag: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let mut playbook = AnsiblePlaybook::new(playbook, self, verify);
        if let Some(flag) = flag {
            playbook.add_cli_arg(flag, true);
        }
        playbook.execute(self.runner.as_ref())
    }

    /// Run each of `playbooks` in order, or `default` when none are given.
    /// Output of every run is concatenated.
    fn run_playbooks(
        &self,
        playbooks: &[PathBuf],
        default: Option<PathBuf>,
        verify: bool,
    ) -> Result<Option<Vec<u8>>> {
        if playbooks.is_empty() {
            return self.run_playbook(default, verify, None);
        }

        let mut combined = Vec::new();
        for playbook in playbooks {
            let playbook = util::abs_path(&self.config.scenario.directory, playbook);
            debug!("Running playbook {}", playbook.display());
            if let Some(output) = self.run_playbook(Some(playbook), verify, None)? {
                combined.extend(output);
            }
        }
        Ok(Some(combined))
    }

    pub fn create(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().create, false, None)
    }

    pub fn prepare(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().prepare, false, None)
    }

    /// Converge with `playbook`, or the scenario's converge playbook.
    pub fn converge(&self, playbook: Option<&Path>) -> Result<Option<Vec<u8>>> {
        let playbook = match playbook {
            Some(path) => Some(util::abs_path(&self.config.scenario.directory, path)),
            None => self.playbooks().converge,
        };
        self.run_playbook(playbook, false, None)
    }

    pub fn side_effect(&self, playbooks: &[PathBuf]) -> Result<Option<Vec<u8>>> {
        self.run_playbooks(playbooks, self.playbooks().side_effect, false)
    }

    /// Run the verify playbooks with the verifier environment applied.
    pub fn verify(&self, playbooks: &[PathBuf]) -> Result<Option<Vec<u8>>> {
        let default = self.playbooks().verify;
        if playbooks.is_empty() && default.is_none() {
            warn!("Skipping, verify playbook not configured.");
            return Ok(None);
        }
        self.run_playbooks(playbooks, default, true)
    }

    pub fn cleanup(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().cleanup, false, None)
    }

    pub fn destroy(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().destroy, false, None)
    }

    pub fn check(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().converge, false, Some("check"))
    }

    pub fn syntax(&self) -> Result<Option<Vec<u8>>> {
        self.run_playbook(self.playbooks().converge, false, Some("syntax-check"))
    }
}
