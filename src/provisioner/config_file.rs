use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tera::{Context as TeraContext, Filter, Tera};

use crate::error::Result;

const TEMPLATE: &str = "# Molecule managed
{% for section in sections %}
[{{ section.name }}]
{% for option in section.options %}{{ option.key }} = {{ option.value | ini }}
{% endfor %}{% endfor %}";

/// Renders a value the way INI readers expect: booleans capitalized,
/// strings bare, anything else as JSON.
struct IniValueFilter;

impl Filter for IniValueFilter {
    fn filter(
        &self,
        value: &tera::Value,
        _args: &HashMap<String, tera::Value>,
    ) -> tera::Result<tera::Value> {
        let rendered = match value {
            tera::Value::Bool(true) => "True".to_string(),
            tera::Value::Bool(false) => "False".to_string(),
            tera::Value::Null => String::new(),
            tera::Value::String(s) => s.clone(),
            tera::Value::Number(n) => n.to_string(),
            other => serde_json::to_string(other)
                .map_err(|e| tera::Error::msg(format!("Cannot render option value: {}", e)))?,
        };
        Ok(tera::Value::String(rendered))
    }
}

#[derive(Serialize)]
struct Section {
    name: String,
    options: Vec<ConfigEntry>,
}

#[derive(Serialize)]
struct ConfigEntry {
    key: String,
    value: tera::Value,
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Render `ansible.cfg` from section → option mappings.
pub fn render(config_options: &Mapping) -> Result<String> {
    let mut sections = Vec::new();
    for (name, options) in config_options {
        let name = key_string(name);
        let Some(options) = options.as_mapping() else {
            warn!("Ignoring config option '{}': not a section", name);
            continue;
        };

        let mut rendered = Vec::with_capacity(options.len());
        for (key, value) in options {
            rendered.push(ConfigEntry {
                key: key_string(key),
                value: tera::to_value(value).map_err(|e| {
                    tera::Error::msg(format!("Cannot convert option '{}': {}", key_string(key), e))
                })?,
            });
        }
        sections.push(Section {
            name,
            options: rendered,
        });
    }

    let mut tera = Tera::default();
    tera.register_filter("ini", IniValueFilter);
    let mut context = TeraContext::new();
    context.insert("sections", &sections);

    let content = tera.render_str(TEMPLATE, &context)?;
    debug!("Rendered {} config section(s)", sections.len());
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_sections() {
        let options: Mapping = serde_yaml::from_str(
            "defaults:\n  forks: 50\n  host_key_checking: false\n  nocows: 1\nssh_connection:\n  scp_if_ssh: true\n  control_path: \"%(directory)s/%%h-%%p-%%r\"\n",
        )
        .unwrap();

        let content = render(&options).unwrap();

        assert_eq!(
            content,
            "# Molecule managed\n\n[defaults]\nforks = 50\nhost_key_checking = False\nnocows = 1\n\n[ssh_connection]\nscp_if_ssh = True\ncontrol_path = %(directory)s/%%h-%%p-%%r\n"
        );
    }

    #[test]
    fn test_render_skips_non_sections() {
        let options: Mapping = serde_yaml::from_str("stray: value\ndefaults:\n  foo: bar\n").unwrap();
        let content = render(&options).unwrap();

        assert!(!content.contains("stray"));
        assert!(content.contains("[defaults]\nfoo = bar\n"));
    }

    #[test]
    fn test_render_nested_values_as_json() {
        let options: Mapping = serde_yaml::from_str(
            "defaults:\n  callbacks_enabled: [profile_tasks, timer]\n  vars: {answer: 42}\n  empty: null\n",
        )
        .unwrap();

        let content = render(&options).unwrap();

        assert_eq!(
            content,
            "# Molecule managed\n\n[defaults]\ncallbacks_enabled = [\"profile_tasks\",\"timer\"]\nvars = {\"answer\":42}\nempty = \n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&Mapping::new()).unwrap(), "# Molecule managed\n");
    }
}
