//! Metadata document reader.

use super::ProjectMetadata;
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a metadata document that exists.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read metadata {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid yaml format in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl MetadataError {
    /// Path of the offending document.
    pub fn path(&self) -> &Path {
        match self {
            MetadataError::Read { path, .. } | MetadataError::Malformed { path, .. } => path,
        }
    }
}

/// Replace every tab with `tab_width` spaces.
pub fn normalize_tabs(content: &str, tab_width: usize) -> String {
    if !content.contains('\t') {
        return content.to_string();
    }
    content.replace('\t', &" ".repeat(tab_width))
}

/// Load `file_name` from `project_dir`.
///
/// Returns `Ok(None)` when the directory has no metadata document.
pub fn load_metadata(
    project_dir: &Path,
    file_name: &str,
    tab_width: usize,
) -> Result<Option<ProjectMetadata>, MetadataError> {
    let path = project_dir.join(file_name);
    if !path.is_file() {
        debug!("No {} in {}", file_name, project_dir.display());
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(|source| MetadataError::Read {
        path: path.clone(),
        source,
    })?;

    let normalized = normalize_tabs(&content, tab_width);
    let value = parse_document(&normalized).map_err(|source| MetadataError::Malformed { path, source })?;

    Ok(Some(ProjectMetadata::new(value)))
}

/// Parse a metadata document the way hand-edited project files expect.
///
/// Repeated mapping keys keep the last value and `<<` merge keys are
/// expanded, so both forms read the same as they do in PyYAML.
fn parse_document(content: &str) -> Result<Value, serde_yaml::Error> {
    let LastWins(mut value) = serde_yaml::from_str(content)?;
    value.apply_merge()?;
    Ok(value)
}

/// A YAML value whose mappings accept duplicate keys.
struct LastWins(Value);

impl<'de> Deserialize<'de> for LastWins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LastWinsVisitor).map(LastWins)
    }
}

struct LastWinsVisitor;

impl<'de> Visitor<'de> for LastWinsVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Number(i.into()))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        Ok(Value::Number(u.into()))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Number(f.into()))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_owned()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        LastWins::deserialize(deserializer).map(|LastWins(v)| v)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        LastWins::deserialize(deserializer).map(|LastWins(v)| v)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(LastWins(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut mapping = Mapping::new();
        while let Some((LastWins(key), LastWins(value))) = map.next_entry()? {
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }

    fn visit_enum<A>(self, data: A) -> Result<Value, A::Error>
    where
        A: EnumAccess<'de>,
    {
        let (tag, contents): (String, _) = data.variant()?;
        if tag.is_empty() {
            return Err(de::Error::custom("empty YAML tag is not allowed"));
        }
        let LastWins(value) = contents.newtype_variant()?;
        Ok(Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(tag),
            value,
        })))
    }
}
