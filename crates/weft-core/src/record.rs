use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// An immutable named-field record behind an `Rc`.
///
/// Selector output (`raw_data`), prepared `data` and instance `state` are all
/// records. [`Record::same`] is pointer identity, which is what the
/// memoization keys compare; an unchanged selector hands back the identical
/// record across cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    fields: Rc<IndexMap<String, Value>>,
}

impl Record {
    pub fn empty() -> Record {
        Record {
            fields: Rc::new(IndexMap::new()),
        }
    }

    pub fn builder() -> RecordBuilder {
        RecordBuilder {
            fields: IndexMap::new(),
        }
    }

    /// Pointer identity of the backing map.
    pub fn same(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New record with `name` set, leaving `self` untouched.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Record {
        let mut fields = (*self.fields).clone();
        fields.insert(name.into(), value.into());
        Record {
            fields: Rc::new(fields),
        }
    }

    /// Shallow merge of `partial` over `self`, producing a new record.
    pub fn merged(&self, partial: &Record) -> Record {
        let mut fields = (*self.fields).clone();
        for (name, value) in partial.iter() {
            fields.insert(name.to_string(), value.clone());
        }
        Record {
            fields: Rc::new(fields),
        }
    }

    /// View the record as an object value. Shares the backing map.
    pub fn to_value(&self) -> Value {
        Value::Object(Rc::clone(&self.fields))
    }

    /// Object values convert for free; anything else is `None`.
    pub fn from_value(value: &Value) -> Option<Record> {
        match value {
            Value::Object(map) => Some(Record {
                fields: Rc::clone(map),
            }),
            _ => None,
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Record::empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: Rc::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

pub struct RecordBuilder {
    fields: IndexMap<String, Value>,
}

impl RecordBuilder {
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn finish(self) -> Record {
        Record {
            fields: Rc::new(self.fields),
        }
    }
}
