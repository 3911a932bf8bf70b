pub mod tree;
pub mod vars;

use log::debug;
use serde_yaml::{Mapping, Value};

use crate::config::Platform;
pub use tree::NestedMapping;

const UNGROUPED: &str = "ungrouped";

/// Variables every instance gets so playbooks can find the scenario.
pub fn molecule_vars() -> Mapping {
    let pairs = [
        ("molecule_file", "{{ lookup('env', 'MOLECULE_FILE') }}"),
        (
            "molecule_ephemeral_directory",
            "{{ lookup('env', 'MOLECULE_EPHEMERAL_DIRECTORY') }}",
        ),
        (
            "molecule_scenario_directory",
            "{{ lookup('env', 'MOLECULE_SCENARIO_DIRECTORY') }}",
        ),
        ("molecule_yml", "{{ lookup('file', molecule_file) | from_yaml }}"),
        (
            "molecule_instance_config",
            "{{ lookup('env', 'MOLECULE_INSTANCE_CONFIG') }}",
        ),
        (
            "molecule_no_log",
            "{{ lookup('env', 'MOLECULE_NO_LOG') or not molecule_yml.provisioner.log|default(False) | bool }}",
        ),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (Value::from(k), Value::from(v)))
        .collect()
}

/// Build the inventory document for `platforms`. Every instance lands in
/// `all` and in each of its groups (`ungrouped` when it declares none),
/// and in the `hosts` of each declared child group.
pub fn build<F>(platforms: &[Platform], mut connection_options: F) -> Mapping
where
    F: FnMut(&str) -> Mapping,
{
    let mut tree = NestedMapping::new();
    let vars = Value::Mapping(molecule_vars());

    for platform in platforms {
        let name = platform.name.as_str();
        let connection = Value::Mapping(connection_options(name));
        let groups: Vec<&str> = if platform.groups.is_empty() {
            vec![UNGROUPED]
        } else {
            platform.groups.iter().map(String::as_str).collect()
        };

        for group in groups {
            debug!("Adding instance '{}' to group '{}'", name, group);
            tree.insert(&["all", "hosts", name], connection.clone())
                .insert(&["all", "vars"], vars.clone())
                .insert(&[group, "hosts", name], connection.clone())
                .insert(&[group, "vars"], vars.clone())
                .insert(&[UNGROUPED, "vars"], Value::Mapping(Mapping::new()));

            for child in &platform.children {
                tree.insert(&[group, "children", child.as_str(), "hosts", name], connection.clone());
            }
        }
    }

    tree.into_mapping()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn platform(name: &str, groups: &[&str], children: &[&str]) -> Platform {
        Platform {
            name: name.to_string(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
            children: children.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn hosts_of(inventory: &Mapping, group: &str) -> Vec<String> {
        inventory[group]["hosts"]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_build_without_platforms_is_empty() {
        assert!(build(&[], |_| Mapping::new()).is_empty());
    }

    #[test]
    fn test_build_groups_and_children() {
        let platforms = vec![
            platform("instance-1", &["foo", "bar"], &["child1"]),
            platform("instance-2", &[], &[]),
        ];

        let inventory = build(&platforms, |name| {
            let mut options = Mapping::new();
            options.insert("ansible_connection".into(), "docker".into());
            options.insert("ansible_host".into(), name.into());
            options
        });

        assert_eq!(hosts_of(&inventory, "all"), vec!["instance-1", "instance-2"]);
        assert_eq!(hosts_of(&inventory, "foo"), vec!["instance-1"]);
        assert_eq!(hosts_of(&inventory, "bar"), vec!["instance-1"]);
        assert_eq!(hosts_of(&inventory, "ungrouped"), vec!["instance-2"]);
        assert_eq!(
            inventory["foo"]["children"]["child1"]["hosts"]["instance-1"]["ansible_host"],
            Value::from("instance-1")
        );
        assert_eq!(inventory["all"]["vars"], Value::Mapping(molecule_vars()));
        assert_eq!(inventory["all"]["hosts"]["instance-2"]["ansible_connection"], Value::from("docker"));
    }

    #[test]
    fn test_ungrouped_vars_are_reset() {
        let inventory = build(&[platform("instance-1", &["web"], &[])], |_| Mapping::new());
        assert_eq!(inventory["ungrouped"]["vars"], Value::Mapping(Mapping::new()));
        assert!(inventory["ungrouped"].get("hosts").is_none());
    }
}
