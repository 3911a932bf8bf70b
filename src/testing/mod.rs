//! Shared testing utilities for provisioner unit and integration tests.
//!
//! [`ScenarioFixture`] lays out a throwaway project with a scenario file,
//! a fake home and a fake data directory, so nothing reads or writes the
//! real user environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tempfile::TempDir;

use crate::config::{Config, RuntimeContext};
use crate::playbook::{PlaybookRunner, RecordingRunner};
use crate::provisioner::Ansible;

/// A provisioner section exercising options, env, config options and
/// every inventory source.
pub const PROVISIONER_SECTION: &str = r#"name: ansible
config_options:
  defaults:
    foo: bar
connection_options:
  foo: bar
options:
  foo: bar
  become: true
  v: true
env:
  FOO: bar
  ANSIBLE_ROLES_PATH: foo/bar
  ANSIBLE_LIBRARY: foo/bar
  ANSIBLE_FILTER_PLUGINS: foo/bar
inventory:
  hosts:
    all:
      hosts:
        extra-host-01: {}
      children:
        extra-group:
          hosts:
            - extra-host-01
  host_vars:
    instance-1:
      - foo: bar
    localhost:
      - foo: baz
  group_vars:
    example_group1:
      - foo: bar
    example_group2:
      - foo: bar
"#;

const PLATFORMS: &str = r#"platforms:
  - name: instance-1
    groups: [foo, bar]
    children: [child1]
  - name: instance-2
    groups: [baz, foo]
    children: [child2]
"#;

/// A scenario on disk at `<root>/<project>/molecule/default/molecule.yml`.
pub struct ScenarioFixture {
    dir: TempDir,
    config: Config,
}

impl ScenarioFixture {
    /// Two platforms plus the given provisioner section.
    pub fn new(provisioner_section: &str) -> Self {
        ScenarioFixture::in_project("project", provisioner_section)
    }

    /// Like [`ScenarioFixture::new`] with the project at `project` below
    /// the fixture root.
    pub fn in_project(project: &str, provisioner_section: &str) -> Self {
        ScenarioFixture::build(project, &scenario_text(provisioner_section))
    }

    /// A scenario file with exactly `text`.
    pub fn with_scenario(text: &str) -> Self {
        ScenarioFixture::build("project", text)
    }

    fn build(project: &str, text: &str) -> Self {
        let dir = tempfile::tempdir().expect("create fixture directory");
        let scenario_dir = dir.path().join(project).join("molecule").join("default");
        fs::create_dir_all(&scenario_dir).expect("create scenario directory");
        let molecule_file = scenario_dir.join("molecule.yml");
        fs::write(&molecule_file, text).expect("write scenario file");

        let runtime = RuntimeContext {
            os_env: Default::default(),
            home_dir: dir.path().join("home"),
            data_dir: dir.path().join("data"),
        };
        let config = Config::load(&molecule_file, runtime).expect("load fixture scenario");

        ScenarioFixture { dir, config }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn scenario_dir(&self) -> &Path {
        &self.config.scenario.directory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Add a variable to the captured OS environment.
    pub fn set_os_env(&mut self, key: &str, value: &str) {
        self.config
            .runtime
            .os_env
            .insert(key.to_string(), value.to_string());
    }

    /// A provisioner over a copy of the current config. Playbook runs are
    /// recorded, never executed.
    pub fn provisioner(&self) -> Ansible {
        self.provisioner_recording().0
    }

    /// A provisioner plus a handle on the runner it records into.
    pub fn provisioner_recording(&self) -> (Ansible, RecordingRunner) {
        let runner = RecordingRunner::new(RecordingRunner::DEFAULT_STDOUT);
        let ansible = self.provisioner_with_runner(Box::new(runner.clone()));
        (ansible, runner)
    }

    pub fn provisioner_with_runner(&self, runner: Box<dyn PlaybookRunner>) -> Ansible {
        Ansible::with_runner(self.config.clone(), runner)
    }
}

fn scenario_text(provisioner_section: &str) -> String {
    let mut text = String::from(PLATFORMS);
    text.push_str("provisioner:\n");
    for line in provisioner_section.lines() {
        text.push_str("  ");
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Parse a YAML mapping literal.
pub fn mapping(yaml: &str) -> Mapping {
    serde_yaml::from_str(yaml).expect("valid YAML mapping")
}

/// Assert that two YAML values are equal, with better error messages
pub fn assert_yaml_eq(actual: &Value, expected: &Value) {
    if actual != expected {
        panic!(
            "YAML values not equal:\n  expected: {:#?}\n  actual:   {:#?}",
            expected, actual
        );
    }
}
