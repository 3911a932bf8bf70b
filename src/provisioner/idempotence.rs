use std::borrow::Cow;

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::Ansible;
use crate::error::{ProvisionerError, Result};

static CHANGED_RECAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"changed=[1-9][0-9]*").expect("valid recap regex"));
static TASK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^TASK \[(.*)\]").expect("valid task regex"));
static CHANGED_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^changed: \[([^\]]+)\]").expect("valid host regex"));
static ANSI_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid escape regex"));

/// Drop the color codes ansible emits when `ANSIBLE_FORCE_COLOR` is set.
pub fn strip_ansi_escape(output: &str) -> Cow<'_, str> {
    ANSI_ESCAPE_RE.replace_all(output, "")
}

/// Whether the play recap of `output` reports no changed tasks.
pub fn is_idempotent(output: &str) -> bool {
    !CHANGED_RECAP_RE.is_match(&strip_ansi_escape(output))
}

/// `* [host] => task` for every task that reported a change.
pub fn non_idempotent_tasks(output: &str) -> Vec<String> {
    let mut task = None;
    let mut tasks = Vec::new();
    let output = strip_ansi_escape(output);
    for line in output.lines().map(str::trim) {
        if let Some(captures) = TASK_RE.captures(line) {
            task = captures.get(1).map(|m| m.as_str().to_string());
        } else if let Some(captures) = CHANGED_HOST_RE.captures(line) {
            let host = &captures[1];
            if let Some(task) = &task {
                tasks.push(format!("* [{}] => {}", host, task));
            }
        }
    }
    tasks
}

impl Ansible {
    /// Converge a second time and fail if anything changed.
    pub fn idempotence(&self) -> Result<Option<Vec<u8>>> {
        let Some(output) = self.converge(None)? else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&output);
        if !is_idempotent(&text) {
            let tasks = non_idempotent_tasks(&text);
            warn!("{} task(s) changed on the second converge", tasks.len());
            return Err(ProvisionerError::NotIdempotent(tasks));
        }

        info!("Idempotence completed successfully.");
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::{PlaybookRunner, RunOutput};
    use crate::testing::ScenarioFixture;
    use pretty_assertions::assert_eq;

    const CHANGED_OUTPUT: &str = "
PLAY [Converge] ****************************************************************

TASK [Gathering Facts] *********************************************************
ok: [instance-1]

TASK [Install package] *********************************************************
changed: [instance-1]
changed: [instance-2]

TASK [Write config] ************************************************************
ok: [instance-1]

PLAY RECAP *********************************************************************
instance-1                 : ok=3    changed=1    unreachable=0    failed=0
instance-2                 : ok=3    changed=1    unreachable=0    failed=0
";

    const CLEAN_OUTPUT: &str = "
PLAY RECAP *********************************************************************
instance-1                 : ok=3    changed=0    unreachable=0    failed=0
";

    struct CannedRunner(&'static str);

    impl PlaybookRunner for CannedRunner {
        fn run(&self, _command: &crate::playbook::BakedCommand) -> Result<RunOutput> {
            Ok(RunOutput {
                code: 0,
                stdout: self.0.as_bytes().to_vec(),
                stderr: Vec::new(),
            })
        }
    }

    #[test]
    fn test_is_idempotent() {
        assert!(is_idempotent(CLEAN_OUTPUT));
        assert!(!is_idempotent(CHANGED_OUTPUT));
    }

    #[test]
    fn test_non_idempotent_tasks() {
        assert_eq!(
            non_idempotent_tasks(CHANGED_OUTPUT),
            vec![
                "* [instance-1] => Install package",
                "* [instance-2] => Install package"
            ]
        );
        assert!(non_idempotent_tasks(CLEAN_OUTPUT).is_empty());
    }

    #[test]
    fn test_non_idempotent_tasks_with_colored_output() {
        let output = "TASK [Install package] ***\n\x1b[0;33mchanged: [instance-1]\x1b[0m\n\nPLAY RECAP ***\ninstance-1 : ok=1 \x1b[0;33mchanged=1\x1b[0m failed=0\n";

        assert!(!is_idempotent(output));
        assert_eq!(
            non_idempotent_tasks(output),
            vec!["* [instance-1] => Install package"]
        );
    }

    #[test]
    fn test_strip_ansi_escape() {
        assert_eq!(strip_ansi_escape("\x1b[1;31mfailed\x1b[0m: [host]"), "failed: [host]");
        assert_eq!(strip_ansi_escape("plain"), "plain");
    }

    #[test]
    fn test_idempotence_fails_on_changes() {
        let fixture = ScenarioFixture::new("");
        let ansible = fixture.provisioner_with_runner(Box::new(CannedRunner(CHANGED_OUTPUT)));

        let err = ansible.idempotence().unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Idempotence test failed because of the following tasks:\n* [instance-1]"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_idempotence_passes() {
        let fixture = ScenarioFixture::new("");
        let ansible = fixture.provisioner_with_runner(Box::new(CannedRunner(CLEAN_OUTPUT)));

        let output = ansible.idempotence().unwrap().unwrap();
        assert_eq!(output, CLEAN_OUTPUT.as_bytes());
    }
}
