use serde_yaml::{Mapping, Value};

/// Builds nested YAML mappings from `(path, value)` insertions. Missing
/// intermediate mappings are created on the way down, so deep entries can
/// be set without preparing their parents first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedMapping {
    root: Mapping,
}

impl NestedMapping {
    pub fn new() -> Self {
        NestedMapping::default()
    }

    /// Set `value` at `path`. A non-mapping value found where an
    /// intermediate mapping is needed is replaced by an empty mapping. An
    /// empty path is ignored.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S], value: Value) -> &mut Self {
        let Some((last, parents)) = path.split_last() else {
            return self;
        };

        let mut node = &mut self.root;
        for segment in parents {
            let key = Value::String(segment.as_ref().to_string());
            if !matches!(node.get(&key), Some(Value::Mapping(_))) {
                node.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            node = match node.get_mut(&key) {
                Some(Value::Mapping(child)) => child,
                _ => unreachable!("intermediate node was just made a mapping"),
            };
        }
        node.insert(Value::String(last.as_ref().to_string()), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn into_mapping(self) -> Mapping {
        self.root
    }
}

impl<S: AsRef<str>> FromIterator<(Vec<S>, Value)> for NestedMapping {
    fn from_iter<I: IntoIterator<Item = (Vec<S>, Value)>>(iter: I) -> Self {
        let mut tree = NestedMapping::new();
        for (path, value) in iter {
            tree.insert(&path, value);
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_creates_intermediate_mappings() {
        let mut tree = NestedMapping::new();
        tree.insert(&["bar", "baz"], Value::String("qux".into()));

        let expected: Mapping = serde_yaml::from_str("bar: {baz: qux}").unwrap();
        assert_eq!(tree.into_mapping(), expected);
    }

    #[test]
    fn test_insert_keeps_siblings() {
        let mut tree = NestedMapping::new();
        tree.insert(&["all", "hosts", "instance-1"], Value::Mapping(Mapping::new()))
            .insert(&["all", "hosts", "instance-2"], Value::Mapping(Mapping::new()))
            .insert(&["all", "vars"], Value::String("x".into()));

        let expected: Mapping =
            serde_yaml::from_str("all: {hosts: {instance-1: {}, instance-2: {}}, vars: x}").unwrap();
        assert_eq!(tree.as_mapping(), &expected);
    }

    #[test]
    fn test_scalar_replaced_by_mapping_when_descending() {
        let mut tree = NestedMapping::new();
        tree.insert(&["a"], Value::Bool(true));
        tree.insert(&["a", "b"], Value::Bool(false));

        let expected: Mapping = serde_yaml::from_str("a: {b: false}").unwrap();
        assert_eq!(tree.into_mapping(), expected);
    }

    #[test]
    fn test_from_iter_and_empty_path() {
        let tree: NestedMapping = vec![
            (vec!["x", "y"], Value::Number(1.into())),
            (vec![], Value::Number(2.into())),
        ]
        .into_iter()
        .collect();

        let expected: Mapping = serde_yaml::from_str("x: {y: 1}").unwrap();
        assert_eq!(tree.into_mapping(), expected);
        assert!(NestedMapping::new().is_empty());
    }
}
