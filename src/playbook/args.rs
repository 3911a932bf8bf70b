use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

static VERBOSE_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v+$").expect("valid verbosity regex"));

/// Turn an options mapping into command line arguments. `true` becomes a
/// bare flag, `false` and null are dropped, single-character keys get a
/// single dash and underscores become dashes.
pub fn dict2args(options: &Mapping) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in options {
        if matches!(value, Value::Bool(false) | Value::Null) {
            continue;
        }
        let key = scalar_to_string(key);
        let prefix = if key.chars().count() == 1 { "-" } else { "--" };
        args.push(format!("{}{}", prefix, key).replace('_', "-"));
        if !matches!(value, Value::Bool(true)) {
            args.push(scalar_to_string(value));
        }
    }
    args
}

/// Pull the first truthy verbosity key (`v`, `vv`, `vvv`) out of
/// `options` and return it as a flag. `verbose` is dropped along with it.
pub fn verbose_flag(options: &mut Mapping) -> Vec<String> {
    let mut key = String::from("v");
    for _ in 0..3 {
        if options.get(key.as_str()).is_some_and(is_truthy) {
            options.remove(key.as_str());
            if options.get("verbose").is_some_and(is_truthy) {
                options.remove("verbose");
            }
            return vec![format!("-{}", key)];
        }
        key.push('v');
    }
    Vec::new()
}

/// Drop every verbosity permutation key from `options`.
pub fn filter_verbose_permutation(options: &Mapping) -> Mapping {
    options
        .iter()
        .filter(|(key, _)| !key.as_str().is_some_and(|k| VERBOSE_KEY_RE.is_match(k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(s) => !s.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Tagged(t) => is_truthy(&t.value),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}
