//! External reference table of known project names.
//!
//! Only key membership matters; values in the source file are ignored.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Set of lower-cased project names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    keys: HashSet<String>,
}

impl ReferenceSet {
    /// Build a set from already normalised keys.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a mapping file. `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference map: {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };

        parsed.with_context(|| format!("Failed to parse reference map: {}", path.display()))
    }

    fn from_json(content: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        Ok(Self::from_keys(map.into_iter().map(|(k, _)| k)))
    }

    fn from_yaml(content: &str) -> Result<Self> {
        let map: serde_yaml::Mapping = serde_yaml::from_str(content)?;
        let mut keys = HashSet::with_capacity(map.len());
        for (key, _) in map {
            match key {
                serde_yaml::Value::String(s) => {
                    keys.insert(s);
                }
                other => bail!("Reference map keys must be strings, found {:?}", other),
            }
        }
        Ok(Self { keys })
    }

    /// True if `name` is a key of the table. No normalisation is applied.
    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains(name)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
