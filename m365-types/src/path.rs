//! Attribute paths into a typed tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an [`AttrPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStep {
    /// A named attribute of an object.
    Attr(String),
    /// A positional element of a list (or an enumerated set element).
    Index(usize),
    /// A key of a map attribute.
    Key(String),
}

/// Location of a node inside a typed tree, rendered like `settings[2].value`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrPath {
    steps: Vec<PathStep>,
}

impl AttrPath {
    /// The empty path, addressing the root object.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a top-level attribute.
    #[must_use]
    pub fn attr(name: impl Into<String>) -> Self {
        Self::root().join_attr(name)
    }

    /// Parses a dotted path such as `assignments.target` or `settings[2].value`.
    ///
    /// Map keys are not expressible in this form; use [`AttrPath::join_key`].
    pub fn parse(dotted: &str) -> Option<Self> {
        let mut path = Self::root();
        if dotted.is_empty() {
            return Some(path);
        }
        for segment in dotted.split('.') {
            let (name, mut rest) = match segment.find('[') {
                Some(pos) => (&segment[..pos], &segment[pos..]),
                None => (segment, ""),
            };
            if name.is_empty() {
                return None;
            }
            path = path.join_attr(name);
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                let index = stripped[..end].parse().ok()?;
                path = path.join_index(index);
                rest = &stripped[end + 1..];
            }
            if !rest.is_empty() {
                return None;
            }
        }
        Some(path)
    }

    #[must_use]
    pub fn join_attr(&self, name: impl Into<String>) -> Self {
        self.join(PathStep::Attr(name.into()))
    }

    #[must_use]
    pub fn join_index(&self, index: usize) -> Self {
        self.join(PathStep::Index(index))
    }

    #[must_use]
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        self.join(PathStep::Key(key.into()))
    }

    fn join(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    /// Returns the steps of this path.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the parent path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.steps.is_empty() {
            return None;
        }
        Some(Self {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    /// Returns the last step, if any.
    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// The dotted schema path of this attribute path: element indexes and
    /// map keys dropped, e.g. `settings[2].value` becomes `settings.value`.
    pub fn schema_path(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| match step {
                PathStep::Attr(name) => Some(name.as_str()),
                PathStep::Index(_) | PathStep::Key(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Attr(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Attr(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
                PathStep::Key(key) => write!(f, "[\"{key}\"]")?,
            }
        }
        Ok(())
    }
}
