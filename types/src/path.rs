//! Path value type
//!
//! A [`Path`] is an ordered list of string segments. It replaces dynamic
//! string-keyed field access: `Path::parse("address.city").get(&doc)` reads a
//! nested field, `set` writes one, creating intermediate maps on the way.
//! Segments that parse as `usize` index into lists.

use std::fmt;
use std::str::FromStr;

use crate::value::{Map, Value};

/// Errors raised when writing through a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("cannot set the root path")]
    Root,

    #[error("segment '{segment}' of '{path}' crosses a {kind} value")]
    NotContainer {
        path: String,
        segment: String,
        kind: &'static str,
    },

    #[error("index '{segment}' of '{path}' is out of bounds")]
    OutOfBounds { path: String, segment: String },
}

/// Ordered string segments addressing a location inside a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The empty path, addressing the value itself.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parses dotted text (`a.b.c`). Empty segments are dropped.
    pub fn parse(text: &str) -> Self {
        Self {
            segments: text
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path without its last segment, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// The path without its first segment.
    pub fn tail(&self) -> Path {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new path with every segment of `other` appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// JSON-pointer style rendering (`/children/0`), used for document locations.
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Reads the value at this path.
    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| step(current, segment))
    }

    pub fn get_mut<'v>(&self, value: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match current {
                Value::Map(map) => map.get_mut(segment.as_str())?,
                Value::List(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `new` at this path, creating maps for missing segments.
    ///
    /// A `Null` met on the way is replaced by an empty map.
    pub fn set(&self, value: &mut Value, new: Value) -> Result<(), PathError> {
        let Some((last, init)) = self.segments.split_last() else {
            return Err(PathError::Root);
        };

        let mut current = value;
        for segment in init {
            if current.is_null() {
                *current = Value::Map(Map::new());
            }
            current = match current {
                Value::Map(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Map(Map::new())),
                Value::List(items) => {
                    let idx = self.index(segment)?;
                    items.get_mut(idx).ok_or_else(|| PathError::OutOfBounds {
                        path: self.to_string(),
                        segment: segment.clone(),
                    })?
                }
                other => {
                    return Err(PathError::NotContainer {
                        path: self.to_string(),
                        segment: segment.clone(),
                        kind: other.kind(),
                    });
                }
            };
        }

        if current.is_null() {
            *current = Value::Map(Map::new());
        }
        match current {
            Value::Map(map) => {
                map.insert(last.clone(), new);
                Ok(())
            }
            Value::List(items) => {
                let idx = self.index(last)?;
                match idx.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[idx] = new,
                    std::cmp::Ordering::Equal => items.push(new),
                    std::cmp::Ordering::Greater => {
                        return Err(PathError::OutOfBounds {
                            path: self.to_string(),
                            segment: last.clone(),
                        });
                    }
                }
                Ok(())
            }
            other => Err(PathError::NotContainer {
                path: self.to_string(),
                segment: last.clone(),
                kind: other.kind(),
            }),
        }
    }

    /// Removes and returns the value at this path (map entries only).
    pub fn remove(&self, value: &mut Value) -> Option<Value> {
        let (last, init) = self.segments.split_last()?;
        let parent = Path::from_segments(init.iter().cloned()).get_mut(value)?;
        parent.as_map_mut()?.remove(last.as_str())
    }

    fn index(&self, segment: &str) -> Result<usize, PathError> {
        segment.parse().map_err(|_| PathError::NotContainer {
            path: self.to_string(),
            segment: segment.to_owned(),
            kind: "list",
        })
    }
}

fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Map(map) => map.get(segment),
        Value::List(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Path::parse(value)
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Path::parse(&value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Path::parse(&text))
    }
}
