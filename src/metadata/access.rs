//! Tolerant access to a schema-less metadata tree.
//!
//! Lookups return a [`Node`], which may be absent. Every accessor on an
//! absent node returns the "empty" answer, so predicates can chain lookups
//! without guarding each step.

use serde_yaml::Value;

/// Parsed contents of a project's metadata document. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMetadata {
    root: Value,
}

impl ProjectMetadata {
    /// Wrap an already parsed YAML value.
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Root of the tree.
    pub fn root(&self) -> Node<'_> {
        Node::new(Some(&self.root))
    }

    /// Shorthand for `self.root().get(key)`.
    pub fn get(&self, key: &str) -> Node<'_> {
        self.root().get(key)
    }
}

impl From<Value> for ProjectMetadata {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

/// A borrowed view into the metadata tree, or the absent sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<'a> {
    value: Option<&'a Value>,
}

impl<'a> Node<'a> {
    fn new(value: Option<&'a Value>) -> Self {
        // Tags carry no meaning for dispatch decisions
        let value = value.map(untag);
        Self { value }
    }

    /// The absent node.
    pub fn absent() -> Self {
        Self { value: None }
    }

    /// True if the path that produced this node does not exist.
    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    /// True if the node exists and is explicitly null.
    pub fn is_null(&self) -> bool {
        matches!(self.value, Some(Value::Null))
    }

    /// Look up a key in a mapping. Absent for anything that is not a mapping.
    pub fn get(&self, key: &str) -> Node<'a> {
        match self.value {
            Some(Value::Mapping(map)) => Node::new(map.get(key)),
            _ => Node::absent(),
        }
    }

    /// Iterate the elements of a sequence. Empty for anything that is not a sequence.
    pub fn items(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let items: &'a [Value] = match self.value {
            Some(Value::Sequence(seq)) => seq.as_slice(),
            _ => &[],
        };
        items.iter().map(|v| Node::new(Some(v)))
    }

    /// The string value, if this node is a string.
    pub fn as_str(&self) -> Option<&'a str> {
        self.value.and_then(Value::as_str)
    }

    /// Python-style truthiness.
    ///
    /// Absent and null are false, booleans are themselves, numbers are true
    /// when non-zero, strings and collections are true when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self.value {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    i != 0
                } else if let Some(u) = n.as_u64() {
                    u != 0
                } else {
                    n.as_f64().map(|f| f != 0.0).unwrap_or(false)
                }
            }
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Sequence(seq)) => !seq.is_empty(),
            Some(Value::Mapping(map)) => !map.is_empty(),
            Some(Value::Tagged(tagged)) => Node::new(Some(&tagged.value)).is_truthy(),
        }
    }

    /// True if this node has a string field `title` equal to `title`.
    pub fn has_title(&self, title: &str) -> bool {
        self.get("title").as_str() == Some(title)
    }
}

fn untag(mut value: &Value) -> &Value {
    while let Value::Tagged(tagged) = value {
        value = &tagged.value;
    }
    value
}
