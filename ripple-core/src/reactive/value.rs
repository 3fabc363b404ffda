//! Values and Raw Containers
//!
//! Reactive state is made of plain [`Value`]s. Structured values live in
//! [`Container`]s, which have identity: cloning a `Container` clones the
//! handle, not the data, and two handles are "the same object" when they point
//! at the same allocation.
//!
//! Reading or writing a raw container never tracks or triggers anything. Wrap
//! it with [`Runtime::reactive`](super::Runtime::reactive) to make it
//! observable.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use super::container::Reactive;
use super::subscriber::TargetId;

/// A property key: record field, sequence index or associative key.
///
/// Also used as the stable identity of sibling tree nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Name(String),
    Index(usize),
    Bool(bool),
}

impl Key {
    /// Whether the key counts as "set" for sibling matching.
    ///
    /// Empty names, index zero and `false` do not identify a node.
    pub fn is_truthy(&self) -> bool {
        match self {
            Key::Name(name) => !name.is_empty(),
            Key::Index(index) => *index != 0,
            Key::Bool(flag) => *flag,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Negative integers are not indices and become names.
impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::Index(index),
            Err(_) => Key::Name(index.to_string()),
        }
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Key::Index(index as usize)
    }
}

impl From<bool> for Key {
    fn from(flag: bool) -> Self {
        Key::Bool(flag)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

/// A dynamically typed value held by reactive state.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// A raw container.
    Object(Container),
    /// A reactive wrapper around a container, as produced by deep reads.
    Reactive(Reactive),
}

impl Value {
    /// Strict comparison used to decide whether a write changed anything.
    ///
    /// Containers compare by identity, and a wrapper is the same object as
    /// the container it wraps. NaN is the same value as NaN.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (a, b) => match (a.as_container(), b.as_container()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }

    /// Strip a reactive wrapper, leaving the raw container.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(reactive) => Value::Object(reactive.raw().clone()),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The underlying raw container, for both raw and wrapped objects.
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Object(container) => Some(container),
            Value::Reactive(reactive) => Some(reactive.raw()),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(reactive) => Some(reactive),
            _ => None,
        }
    }

    /// Build a value from JSON. Arrays become sequences and objects become
    /// records, each a fresh container.
    pub fn from_json(json: JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(text) => Value::Text(text),
            JsonValue::Array(items) => Value::Object(Container::sequence(
                items.into_iter().map(Value::from_json),
            )),
            JsonValue::Object(fields) => Value::Object(Container::record(
                fields.into_iter().map(|(name, value)| (name, Value::from_json(value))),
            )),
        }
    }

    /// Snapshot the value as JSON. Cycles and non-finite numbers become `null`.
    pub fn to_json(&self) -> JsonValue {
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut HashSet<TargetId>) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Number(number) => json_number(*number),
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::Object(_) | Value::Reactive(_) => {
                let Some(container) = self.as_container() else {
                    return JsonValue::Null;
                };
                if !visiting.insert(container.id()) {
                    return JsonValue::Null;
                }
                let json = container.to_json_inner(visiting);
                visiting.remove(&container.id());
                json
            }
        }
    }
}

/// Whole numbers in `i64` range stay integers so JSON `2` reads back as `2`.
fn json_number(number: f64) -> JsonValue {
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        return JsonValue::from(number as i64);
    }
    JsonNumber::from_f64(number)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(flag) => write!(f, "Bool({flag})"),
            Value::Number(number) => write!(f, "Number({number})"),
            Value::Text(text) => write!(f, "Text({text:?})"),
            Value::Object(container) => write!(f, "Object({container:?})"),
            Value::Reactive(reactive) => write!(f, "Reactive({reactive:?})"),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<u32> for Value {
    fn from(number: u32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<usize> for Value {
    fn from(number: usize) -> Self {
        Value::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Object(container)
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Reactive(reactive)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Name(name) => Value::Text(name),
            Key::Index(index) => Value::from(index),
            Key::Bool(flag) => Value::Bool(flag),
        }
    }
}

/// Which kind of data a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Named fields in insertion order.
    Record,
    /// An ordered sequence addressed by index.
    Sequence,
    /// An associative collection of key/value entries in insertion order.
    Map,
    /// An associative collection of unique keys in insertion order.
    Set,
}

impl ContainerKind {
    /// Maps and sets: collections whose iteration is keyed by entries.
    pub fn is_associative(&self) -> bool {
        matches!(self, ContainerKind::Map | ContainerKind::Set)
    }
}

pub(crate) enum ContainerData {
    Record(IndexMap<String, Value>),
    Sequence(Vec<Value>),
    Map(IndexMap<Key, Value>),
    Set(IndexSet<Key>),
}

struct ContainerCell {
    id: TargetId,
    data: RefCell<ContainerData>,
}

/// An identity-bearing plain container.
#[derive(Clone)]
pub struct Container {
    cell: Rc<ContainerCell>,
}

impl Container {
    fn from_data(data: ContainerData) -> Self {
        Self {
            cell: Rc::new(ContainerCell {
                id: TargetId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// A record with the given fields.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::from_data(ContainerData::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into_raw()))
                .collect(),
        ))
    }

    /// A sequence holding the given items.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::from_data(ContainerData::Sequence(
            items.into_iter().map(Value::into_raw).collect(),
        ))
    }

    /// An associative map holding the given entries.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::from_data(ContainerData::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into_raw()))
                .collect(),
        ))
    }

    /// A set holding the given keys.
    pub fn set<K, I>(keys: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = K>,
    {
        Self::from_data(ContainerData::Set(keys.into_iter().map(Into::into).collect()))
    }

    /// Identity of this container.
    pub fn id(&self) -> TargetId {
        self.cell.id
    }

    pub fn kind(&self) -> ContainerKind {
        match &*self.cell.data.borrow() {
            ContainerData::Record(_) => ContainerKind::Record,
            ContainerData::Sequence(_) => ContainerKind::Sequence,
            ContainerData::Map(_) => ContainerKind::Map,
            ContainerData::Set(_) => ContainerKind::Set,
        }
    }

    /// Whether both handles point at the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn data(&self) -> Ref<'_, ContainerData> {
        self.cell.data.borrow()
    }

    /// Read a property without tracking.
    ///
    /// Sets report membership as a boolean.
    pub fn get_raw(&self, key: &Key) -> Option<Value> {
        match &*self.cell.data.borrow() {
            ContainerData::Record(fields) => key.as_name().and_then(|name| fields.get(name).cloned()),
            ContainerData::Sequence(items) => key.as_index().and_then(|index| items.get(index).cloned()),
            ContainerData::Map(entries) => entries.get(key).cloned(),
            ContainerData::Set(keys) => keys.contains(key).then_some(Value::Bool(true)),
        }
    }

    /// Whether the property exists, without tracking.
    pub fn has_raw(&self, key: &Key) -> bool {
        match &*self.cell.data.borrow() {
            ContainerData::Record(fields) => key.as_name().is_some_and(|name| fields.contains_key(name)),
            ContainerData::Sequence(items) => key.as_index().is_some_and(|index| index < items.len()),
            ContainerData::Map(entries) => entries.contains_key(key),
            ContainerData::Set(keys) => keys.contains(key),
        }
    }

    /// Write a property without triggering. Returns the previous value, or
    /// `Err(())` if the key cannot address this kind of container.
    ///
    /// Writing past the end of a sequence pads the gap with nulls. Writing to
    /// a set adds the key and ignores the value.
    pub fn set_raw(&self, key: Key, value: Value) -> Result<Option<Value>, ()> {
        let value = value.into_raw();
        match &mut *self.cell.data.borrow_mut() {
            ContainerData::Record(fields) => match key {
                Key::Name(name) => Ok(fields.insert(name, value)),
                _ => Err(()),
            },
            ContainerData::Sequence(items) => match key {
                Key::Index(index) if index < items.len() => {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                }
                Key::Index(index) => {
                    items.resize(index, Value::Null);
                    items.push(value);
                    Ok(None)
                }
                _ => Err(()),
            },
            ContainerData::Map(entries) => Ok(entries.insert(key, value)),
            ContainerData::Set(keys) => {
                let added = keys.insert(key);
                Ok((!added).then_some(Value::Bool(true)))
            }
        }
    }

    /// Delete a property without triggering. Returns whether it existed.
    ///
    /// Deleting a sequence slot leaves a null hole; the length is unchanged.
    pub fn delete_raw(&self, key: &Key) -> bool {
        match &mut *self.cell.data.borrow_mut() {
            ContainerData::Record(fields) => key
                .as_name()
                .is_some_and(|name| fields.shift_remove(name).is_some()),
            ContainerData::Sequence(items) => match key.as_index() {
                Some(index) if index < items.len() => {
                    items[index] = Value::Null;
                    true
                }
                _ => false,
            },
            ContainerData::Map(entries) => entries.shift_remove(key).is_some(),
            ContainerData::Set(keys) => keys.shift_remove(key),
        }
    }

    /// Own keys in iteration order, without tracking.
    pub fn keys_raw(&self) -> Vec<Key> {
        match &*self.cell.data.borrow() {
            ContainerData::Record(fields) => fields.keys().map(|name| Key::Name(name.clone())).collect(),
            ContainerData::Sequence(items) => (0..items.len()).map(Key::Index).collect(),
            ContainerData::Map(entries) => entries.keys().cloned().collect(),
            ContainerData::Set(keys) => keys.iter().cloned().collect(),
        }
    }

    /// Number of fields, items or entries, without tracking.
    pub fn len_raw(&self) -> usize {
        match &*self.cell.data.borrow() {
            ContainerData::Record(fields) => fields.len(),
            ContainerData::Sequence(items) => items.len(),
            ContainerData::Map(entries) => entries.len(),
            ContainerData::Set(keys) => keys.len(),
        }
    }

    /// Resize a sequence, padding with nulls. Returns the previous length, or
    /// `None` if this is not a sequence.
    pub(crate) fn resize_raw(&self, len: usize) -> Option<usize> {
        match &mut *self.cell.data.borrow_mut() {
            ContainerData::Sequence(items) => {
                let previous = items.len();
                items.resize(len, Value::Null);
                Some(previous)
            }
            _ => None,
        }
    }

    /// Insert into a sequence, shifting later items right.
    pub(crate) fn insert_raw(&self, index: usize, value: Value) -> bool {
        match &mut *self.cell.data.borrow_mut() {
            ContainerData::Sequence(items) if index <= items.len() => {
                items.insert(index, value.into_raw());
                true
            }
            _ => false,
        }
    }

    /// Remove from a sequence, shifting later items left.
    pub(crate) fn remove_raw(&self, index: usize) -> Option<Value> {
        match &mut *self.cell.data.borrow_mut() {
            ContainerData::Sequence(items) if index < items.len() => Some(items.remove(index)),
            _ => None,
        }
    }

    /// Snapshot of all values in iteration order, without tracking.
    pub(crate) fn values_raw(&self) -> Vec<Value> {
        match &*self.cell.data.borrow() {
            ContainerData::Record(fields) => fields.values().cloned().collect(),
            ContainerData::Sequence(items) => items.clone(),
            ContainerData::Map(entries) => entries.values().cloned().collect(),
            ContainerData::Set(keys) => keys.iter().cloned().map(Value::from).collect(),
        }
    }

    fn to_json_inner(&self, visiting: &mut HashSet<TargetId>) -> JsonValue {
        let data = self.cell.data.borrow();
        match &*data {
            ContainerData::Record(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json_inner(visiting)))
                    .collect::<JsonMap<_, _>>(),
            ),
            ContainerData::Sequence(items) => {
                JsonValue::Array(items.iter().map(|item| item.to_json_inner(visiting)).collect())
            }
            ContainerData::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_json_inner(visiting)))
                    .collect::<JsonMap<_, _>>(),
            ),
            ContainerData::Set(keys) => JsonValue::Array(
                keys.iter()
                    .map(|key| Value::from(key.clone()).to_json_inner(visiting))
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("len", &self.len_raw())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_is_same_value_as_nan() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).same_value(&Value::Number(f64::NAN)));
        assert!(Value::Number(0.0).same_value(&Value::Number(-0.0)));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Container::record([("x", Value::from(1))]);
        let b = Container::record([("x", Value::from(1))]);

        assert!(Value::Object(a.clone()).same_value(&Value::Object(a.clone())));
        assert!(!Value::Object(a).same_value(&Value::Object(b)));
    }

    #[test]
    fn sequence_writes_past_end_pad_with_null() {
        let seq = Container::sequence([Value::from(1)]);
        assert_eq!(seq.set_raw(Key::Index(3), Value::from(4)), Ok(None));
        assert_eq!(seq.len_raw(), 4);
        assert_eq!(seq.get_raw(&Key::Index(1)), Some(Value::Null));
    }

    #[test]
    fn record_rejects_index_keys() {
        let record = Container::record(Vec::<(&str, Value)>::new());
        assert_eq!(record.set_raw(Key::Index(0), Value::Null), Err(()));
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let source = json!({ "name": "ripple", "tags": ["a", "b"], "depth": 2 });
        let value = Value::from_json(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn json_keeps_integers_apart_from_floats() {
        let source = json!({ "count": 2, "ratio": 0.5, "neg": -7 });
        let json = Value::from_json(source.clone()).to_json();
        assert_eq!(json, source);
        assert!(json["count"].is_i64());
        assert!(json["ratio"].is_f64());
        assert_eq!(Value::from(f64::NAN).to_json(), JsonValue::Null);
    }

    #[test]
    fn json_snapshot_cuts_cycles() {
        let record = Container::record(Vec::<(&str, Value)>::new());
        record
            .set_raw(Key::from("me"), Value::Object(record.clone()))
            .unwrap();
        assert_eq!(Value::Object(record).to_json(), json!({ "me": null }));
    }

    #[test]
    fn falsy_keys() {
        assert!(!Key::from("").is_truthy());
        assert!(!Key::Index(0).is_truthy());
        assert!(!Key::Bool(false).is_truthy());
        assert!(Key::from("a").is_truthy());
        assert!(Key::Index(1).is_truthy());
    }
}
