//! Immutable data values and dotted paths.
//!
//! Store data is an acyclic tree of [`Value`]s. Compound variants share their
//! payload behind `Rc`, so cloning a value (or an untouched subtree during a
//! path write) is cheap and preserves identity. The engine's memoization
//! compares values with [`Value::same`]; deep equality is a separate,
//! explicit operation (`PartialEq`).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// A single immutable data value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    List(Rc<Vec<Value>>),
    Object(Rc<IndexMap<String, Value>>),
}

impl Value {
    /// Build a list value from anything convertible to values.
    pub fn list<I, T>(items: I) -> Value
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build an object value from key/value pairs, preserving insertion order.
    pub fn object<I, K, T>(pairs: I) -> Value
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Object(Rc::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Identity comparison: scalars by value, compound variants by pointer.
    ///
    /// This is the comparison the memoization layer runs; two structurally
    /// equal lists rebuilt from scratch are *not* `same`.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // bitwise so NaN is identical to itself and cannot wedge the
            // memoization into permanent invalidation
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Truthiness used by the default visibility predicate.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::List(_) | Value::Object(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Text coercion for rendering. Compound values render empty.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Text(s) => s.to_string(),
            Value::List(_) | Value::Object(_) => String::new(),
        }
    }

    /// Walk `path` down the tree. `None` when any segment is absent or the
    /// shape does not match.
    pub fn get_path(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for seg in path.segments() {
            current = match (current, seg) {
                (Value::Object(map), PathSeg::Key(key)) => map.get(&**key)?,
                (Value::List(items), PathSeg::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Persistent path write. Returns the new root, or `None` when the write
    /// changed nothing (the existing leaf is structurally equal, or the path
    /// is unwritable). Untouched branches keep their `Rc` identity.
    pub fn with_path_set(&self, path: &Path, value: Value) -> Option<Value> {
        self.set_segments(path.segments(), value)
    }

    fn set_segments(&self, segs: &[PathSeg], value: Value) -> Option<Value> {
        let (seg, rest) = match segs.split_first() {
            Some(split) => split,
            None => {
                return if *self == value { None } else { Some(value) };
            }
        };
        match seg {
            PathSeg::Key(key) => {
                let map = match self {
                    Value::Object(map) => Rc::clone(map),
                    // writing through a scalar or null replaces it with an object
                    _ => Rc::new(IndexMap::new()),
                };
                let child = map.get(&**key).cloned().unwrap_or(Value::Null);
                let new_child = child.set_segments(rest, value)?;
                let mut next = (*map).clone();
                next.insert(key.to_string(), new_child);
                Some(Value::Object(Rc::new(next)))
            }
            PathSeg::Index(index) => {
                let items = match self {
                    Value::List(items) => Rc::clone(items),
                    _ => Rc::new(Vec::new()),
                };
                if *index > items.len() {
                    log::debug!(
                        target: "weft::store",
                        "write at index {} past end of list (len {}), ignored",
                        index,
                        items.len()
                    );
                    return None;
                }
                let child = items.get(*index).cloned().unwrap_or(Value::Null);
                let new_child = child.set_segments(rest, value)?;
                let mut next = (*items).clone();
                if *index == next.len() {
                    next.push(new_child);
                } else {
                    next[*index] = new_child;
                }
                Some(Value::List(Rc::new(next)))
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Rc::from(v.as_str()))
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Value::Text(v)
    }
}

/// One step of a dotted path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Key(Rc<str>),
    Index(usize),
}

/// A parsed dotted path such as `todos.0.title`.
///
/// All-digit segments address list elements, everything else object keys.
/// Paths are immutable and cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Rc<[PathSeg]>,
}

impl Path {
    /// The empty path addressing the store root.
    pub fn root() -> Path {
        Path {
            segments: Rc::from(Vec::new()),
        }
    }

    pub fn parse(text: &str) -> Path {
        let segments: Vec<PathSeg> = text
            .split('.')
            .filter(|seg| !seg.is_empty())
            .map(|seg| {
                if seg.bytes().all(|b| b.is_ascii_digit()) {
                    match seg.parse::<usize>() {
                        Ok(index) => PathSeg::Index(index),
                        Err(_) => PathSeg::Key(Rc::from(seg)),
                    }
                } else {
                    PathSeg::Key(Rc::from(seg))
                }
            })
            .collect();
        Path {
            segments: Rc::from(segments),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSeg] {
        &self.segments
    }

    /// Concatenate, treating `other` as relative to `self`.
    pub fn join(&self, other: &Path) -> Path {
        if self.is_root() {
            return other.clone();
        }
        if other.is_root() {
            return self.clone();
        }
        let mut segments = Vec::with_capacity(self.segments.len() + other.segments.len());
        segments.extend_from_slice(&self.segments);
        segments.extend_from_slice(&other.segments);
        Path {
            segments: Rc::from(segments),
        }
    }

    /// Append a list index segment.
    pub fn index(&self, index: usize) -> Path {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(PathSeg::Index(index));
        Path {
            segments: Rc::from(segments),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match seg {
                PathSeg::Key(key) => f.write_str(key)?,
                PathSeg::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Path::parse(text)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}
