use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::info;

use crate::config::{Action, Config, RuntimeContext};
use crate::playbook::PlaybookRunner;
use crate::provisioner::Ansible;
use crate::util;

pub const DEFAULT_SCENARIO_FILE: &str = "molecule/default/molecule.yml";

fn ansible_args() -> Arg {
    Arg::new("ansible_args")
        .help("Extra arguments passed to ansible-playbook")
        .num_args(0..)
        .last(true)
        .allow_hyphen_values(true)
        .value_name("ANSIBLE_ARGS")
}

fn playbooks_arg(multiple: bool) -> Arg {
    let arg = Arg::new("playbook")
        .help("Playbook to run instead of the configured one")
        .value_name("PLAYBOOK");
    if multiple {
        arg.num_args(0..).action(ArgAction::Append)
    } else {
        arg
    }
}

fn lifecycle(name: &'static str, about: &'static str, playbook: Option<Arg>) -> Command {
    let command = Command::new(name).about(about);
    let command = match playbook {
        Some(arg) => command.arg(arg),
        None => command,
    };
    command.arg(ansible_args())
}

pub fn build_cli() -> Command {
    Command::new("provisioner")
        .about("Drive ansible-playbook through the lifecycle of a test scenario")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("scenario_file")
                .short('f')
                .long("scenario-file")
                .help("Scenario file to load")
                .value_name("FILE")
                .default_value(DEFAULT_SCENARIO_FILE)
                .global(true),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Run playbooks with maximum verbosity and diffs")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity (up to -vvv)")
                .global(true),
        )
        .subcommand(lifecycle("create", "Run the create playbook", None))
        .subcommand(lifecycle("prepare", "Run the prepare playbook", None))
        .subcommand(lifecycle(
            "converge",
            "Run the converge playbook",
            Some(playbooks_arg(false)),
        ))
        .subcommand(lifecycle(
            "idempotence",
            "Converge again and fail if any task reports a change",
            None,
        ))
        .subcommand(lifecycle(
            "side-effect",
            "Run the side effect playbooks",
            Some(playbooks_arg(true)),
        ))
        .subcommand(lifecycle(
            "verify",
            "Run the verify playbooks",
            Some(playbooks_arg(true)),
        ))
        .subcommand(lifecycle("cleanup", "Run the cleanup playbook", None))
        .subcommand(lifecycle("destroy", "Run the destroy playbook", None))
        .subcommand(lifecycle("check", "Run the converge playbook in check mode", None))
        .subcommand(lifecycle("syntax", "Check the syntax of the converge playbook", None))
        .subcommand(
            Command::new("env")
                .about("Print the environment ansible-playbook runs with")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print as a JSON object")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("inventory").about("Print the generated inventory"))
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    if !matches.try_contains_id(id).unwrap_or(false) {
        return Vec::new();
    }
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn load_config(matches: &ArgMatches, cwd: &Path, runtime: RuntimeContext) -> Result<Config> {
    let file = matches
        .get_one::<String>("scenario_file")
        .map(String::as_str)
        .unwrap_or(DEFAULT_SCENARIO_FILE);
    let path = util::abs_path(cwd, file);
    Config::load(&path, runtime)
        .with_context(|| format!("Failed to load scenario file {}", path.display()))
}

/// Execute the parsed command line, writing playbook output and
/// inspection results to `out`.
pub fn run(
    matches: &ArgMatches,
    cwd: &Path,
    runtime: RuntimeContext,
    runner: Box<dyn PlaybookRunner>,
    out: &mut dyn Write,
) -> Result<()> {
    let Some((name, sub_matches)) = matches.subcommand() else {
        bail!("No subcommand given");
    };

    let mut config = load_config(matches, cwd, runtime)?;
    config.debug = matches.get_flag("debug");
    config.ansible_args = strings(sub_matches, "ansible_args");
    if let Ok(action) = name.parse::<Action>() {
        config.action = action;
    }
    let ansible = Ansible::with_runner(config, runner);

    match name {
        "env" => {
            let env = ansible.env();
            if sub_matches.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&env)?)?;
            } else {
                for (key, value) in &env {
                    writeln!(out, "{}={}", key, value)?;
                }
            }
            return Ok(());
        }
        "inventory" => {
            ansible.verify_inventory()?;
            write!(out, "{}", util::safe_dump(&ansible.inventory()?)?)?;
            return Ok(());
        }
        _ => {}
    }

    ansible.write_config()?;
    ansible.manage_inventory()?;

    info!("Running {} for scenario '{}'", name, ansible.config().scenario.name);
    let playbooks: Vec<PathBuf> = strings(sub_matches, "playbook")
        .into_iter()
        .map(PathBuf::from)
        .collect();
    let output = match name {
        "create" => ansible.create()?,
        "prepare" => ansible.prepare()?,
        "converge" => ansible.converge(playbooks.first().map(PathBuf::as_path))?,
        "idempotence" => ansible.idempotence()?,
        "side-effect" => ansible.side_effect(&playbooks)?,
        "verify" => ansible.verify(&playbooks)?,
        "cleanup" => ansible.cleanup()?,
        "destroy" => ansible.destroy()?,
        "check" => ansible.check()?,
        "syntax" => ansible.syntax()?,
        other => bail!("Unknown command: {}", other),
    };

    if let Some(output) = output {
        out.write_all(&output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cli_subcommands() {
        let cmd = build_cli();
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in [
            "create",
            "prepare",
            "converge",
            "idempotence",
            "side-effect",
            "verify",
            "cleanup",
            "destroy",
            "check",
            "syntax",
            "env",
            "inventory",
        ] {
            assert!(subcommands.contains(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_global_flags_and_ansible_args() {
        let matches = build_cli()
            .try_get_matches_from([
                "provisioner",
                "-vv",
                "--debug",
                "-f",
                "molecule/other/molecule.yml",
                "converge",
                "site.yml",
                "--",
                "--limit",
                "instance-1",
            ])
            .unwrap();

        assert_eq!(matches.get_count("verbose"), 2);
        assert!(matches.get_flag("debug"));
        assert_eq!(
            matches.get_one::<String>("scenario_file").unwrap(),
            "molecule/other/molecule.yml"
        );
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "converge");
        assert_eq!(strings(sub, "playbook"), vec!["site.yml"]);
        assert_eq!(strings(sub, "ansible_args"), vec!["--limit", "instance-1"]);
    }

    #[test]
    fn test_defaults() {
        let matches = build_cli().try_get_matches_from(["provisioner", "env"]).unwrap();
        assert_eq!(
            matches.get_one::<String>("scenario_file").unwrap(),
            DEFAULT_SCENARIO_FILE
        );
        let (_, sub) = matches.subcommand().unwrap();
        assert!(strings(sub, "ansible_args").is_empty());
        assert!(!sub.get_flag("json"));
    }

    #[test]
    fn test_multiple_verify_playbooks() {
        let matches = build_cli()
            .try_get_matches_from(["provisioner", "verify", "a.yml", "b.yml"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(strings(sub, "playbook"), vec!["a.yml", "b.yml"]);
    }
}
