use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::config::EnvMap;
use crate::error::{ProvisionerError, Result};

/// A fully prepared `ansible-playbook` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: EnvMap,
}

impl BakedCommand {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Executes baked commands. The process runner is used outside of tests.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybookRunner {
    fn run(&self, command: &BakedCommand) -> Result<RunOutput>;
}

/// Spawns the command as a child process with exactly the merged
/// environment and waits for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl PlaybookRunner for ProcessRunner {
    fn run(&self, command: &BakedCommand) -> Result<RunOutput> {
        debug!("Executing: {}", command.command_line());

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .env_clear()
            .envs(&command.env)
            .output()
            .map_err(|source| ProvisionerError::Spawn {
                command: command.command_line(),
                source,
            })?;

        if !output.stderr.is_empty() {
            warn!("{}", String::from_utf8_lossy(&output.stderr).trim_end());
        }

        Ok(RunOutput {
            code: output.status.code().unwrap_or(1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Records every command and answers with a canned output. Handy for
/// tests that need to look at what would have been executed.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    commands: Arc<Mutex<Vec<BakedCommand>>>,
    output: RunOutput,
}

impl RecordingRunner {
    pub const DEFAULT_STDOUT: &'static [u8] = b"patched-ansible-playbook-stdout";

    pub fn new(stdout: &[u8]) -> Self {
        RecordingRunner {
            commands: Arc::default(),
            output: RunOutput {
                code: 0,
                stdout: stdout.to_vec(),
                stderr: Vec::new(),
            },
        }
    }

    pub fn failing(code: i32) -> Self {
        RecordingRunner {
            commands: Arc::default(),
            output: RunOutput {
                code,
                ..RunOutput::default()
            },
        }
    }

    pub fn commands(&self) -> Vec<BakedCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl PlaybookRunner for RecordingRunner {
    fn run(&self, command: &BakedCommand) -> Result<RunOutput> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.clone());
        }
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_process_runner_uses_given_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = EnvMap::new();
        env.insert("GREETING".into(), "hello".into());
        let command = BakedCommand {
            program: "/bin/sh".into(),
            args: vec!["-c".into(), "printf \"$GREETING\"".into()],
            cwd: dir.path().to_path_buf(),
            env,
        };

        let output = ProcessRunner.run(&command).unwrap();
        assert_eq!(output.code, 0);
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn test_process_runner_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let command = BakedCommand {
            program: "definitely-not-a-real-ansible-playbook".into(),
            args: vec![],
            cwd: dir.path().to_path_buf(),
            env: EnvMap::new(),
        };
        let err = ProcessRunner.run(&command).unwrap_err();
        assert!(matches!(err, ProvisionerError::Spawn { .. }));
    }

    #[test]
    fn test_recording_runner() {
        let runner = RecordingRunner::new(b"ok");
        let command = BakedCommand {
            program: "ansible-playbook".into(),
            args: vec!["converge.yml".into()],
            cwd: PathBuf::from("/"),
            env: EnvMap::new(),
        };
        assert_eq!(runner.run(&command).unwrap().stdout, b"ok");
        assert_eq!(runner.commands(), vec![command.clone()]);
        assert_eq!(command.command_line(), "ansible-playbook converge.yml");
    }
}
