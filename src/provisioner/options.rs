use serde_yaml::{Mapping, Value};

use super::Ansible;
use crate::config::Action;
use crate::playbook::args::filter_verbose_permutation;
use crate::util::merge_dicts;

const SKIP_TAGS: &str = "molecule-notest,notest";
const IDEMPOTENCE_SKIP_TAG: &str = "molecule-idempotence-notest";

fn section(pairs: Vec<(&str, Value)>) -> Value {
    Value::Mapping(pairs.into_iter().map(|(k, v)| (Value::from(k), v)).collect())
}

impl Ansible {
    /// Baseline `ansible.cfg` contents.
    pub fn default_config_options(&self) -> Mapping {
        let defaults = section(vec![
            (
                "ansible_managed",
                Value::from("Ansible managed: Do NOT edit this file manually!"),
            ),
            ("display_failed_stderr", Value::Bool(true)),
            ("forks", Value::from(50)),
            ("host_key_checking", Value::Bool(false)),
            ("interpreter_python", Value::from("auto_silent")),
            ("nocows", Value::from(1)),
            ("retry_files_enabled", Value::Bool(false)),
        ]);
        let ssh_connection = section(vec![
            ("control_path", Value::from("%(directory)s/%%h-%%p-%%r")),
            ("scp_if_ssh", Value::Bool(true)),
        ]);

        let mut options = Mapping::new();
        options.insert(Value::from("defaults"), defaults);
        options.insert(Value::from("ssh_connection"), ssh_connection);
        options
    }

    pub fn config_options(&self) -> Mapping {
        merge_dicts(
            &self.default_config_options(),
            &self.config().provisioner().config_options,
        )
    }

    pub fn default_options(&self) -> Mapping {
        let mut skip_tags = SKIP_TAGS.to_string();
        if self.config().action == Action::Idempotence {
            skip_tags.push(',');
            skip_tags.push_str(IDEMPOTENCE_SKIP_TAG);
        }

        let mut options = Mapping::new();
        options.insert(Value::from("skip-tags"), Value::from(skip_tags));
        options
    }

    /// Options passed to `ansible-playbook` for the current action.
    pub fn options(&self) -> Mapping {
        let config = self.config();
        if config.action.is_destructive() {
            return self.default_options();
        }

        let user = &config.provisioner().options;
        if !config.debug {
            return merge_dicts(&self.default_options(), user);
        }

        // debug replaces whatever verbosity the user asked for
        let mut options = merge_dicts(&self.default_options(), &filter_verbose_permutation(user));
        options.insert(Value::from("vvv"), Value::Bool(true));
        options.insert(Value::from("diff"), Value::Bool(true));
        options
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Action;
    use crate::testing::{mapping, ScenarioFixture, PROVISIONER_SECTION};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_options() {
        let fixture = ScenarioFixture::new("");
        let expected = mapping(
            r#"
defaults:
  ansible_managed: "Ansible managed: Do NOT edit this file manually!"
  display_failed_stderr: true
  forks: 50
  host_key_checking: false
  interpreter_python: auto_silent
  nocows: 1
  retry_files_enabled: false
ssh_connection:
  control_path: "%(directory)s/%%h-%%p-%%r"
  scp_if_ssh: true
"#,
        );
        assert_eq!(fixture.provisioner().default_config_options(), expected);
    }

    #[test]
    fn test_config_options_merges_user_sections() {
        let fixture = ScenarioFixture::new(PROVISIONER_SECTION);
        let ansible = fixture.provisioner();

        let options = ansible.config_options();

        assert_eq!(options["defaults"]["foo"], "bar");
        assert_eq!(options["defaults"]["forks"], 50_i64);
        assert_eq!(options["ssh_connection"]["scp_if_ssh"], true);
        assert_eq!(ansible.default_config_options()["defaults"].get("foo"), None);
    }

    #[test]
    fn test_default_options() {
        let fixture = ScenarioFixture::new("");
        assert_eq!(
            fixture.provisioner().default_options(),
            mapping("skip-tags: molecule-notest,notest")
        );
    }

    #[test]
    fn test_default_options_for_idempotence() {
        let mut fixture = ScenarioFixture::new("");
        fixture.config_mut().action = Action::Idempotence;
        assert_eq!(
            fixture.provisioner().default_options(),
            mapping("skip-tags: molecule-notest,notest,molecule-idempotence-notest")
        );
    }

    #[test]
    fn test_options_merges_user_options() {
        let fixture = ScenarioFixture::new(PROVISIONER_SECTION);
        assert_eq!(
            fixture.provisioner().options(),
            mapping("become: true\nfoo: bar\nv: true\nskip-tags: molecule-notest,notest")
        );
    }

    #[test]
    fn test_options_does_not_merge_for_create_and_destroy() {
        for action in [Action::Create, Action::Destroy] {
            let mut fixture = ScenarioFixture::new(PROVISIONER_SECTION);
            fixture.config_mut().action = action;
            fixture.config_mut().debug = true;
            let ansible = fixture.provisioner();

            assert_eq!(ansible.options(), ansible.default_options());
            assert_eq!(ansible.options(), mapping("skip-tags: molecule-notest,notest"));
        }
    }

    #[test]
    fn test_options_in_debug() {
        let mut fixture = ScenarioFixture::new("options: {become: true, v: true}");
        fixture.config_mut().debug = true;

        assert_eq!(
            fixture.provisioner().options(),
            mapping("vvv: true\nbecome: true\ndiff: true\nskip-tags: molecule-notest,notest")
        );
    }

    #[test]
    fn test_options_recomputed_on_each_access() {
        let mut fixture = ScenarioFixture::new(PROVISIONER_SECTION);
        let first = fixture.provisioner().options();
        fixture.config_mut().action = Action::Destroy;
        let second = fixture.provisioner().options();

        assert!(first.contains_key("foo"));
        assert!(!second.contains_key("foo"));
    }
}
