// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! The dynamic value carried between pipeline elements.
//!
//! `PipelineElement`s pass Python-style duck-typed data to each other
//! through `out` accumulators, and the same values cross the wire as
//! RPC payloads. `Value` is the typed stand-in for that: a small,
//! JSON-shaped algebraic type with a matching `ValueType` vocabulary
//! `TypeSpec` checks against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type vocabulary `TypeSpec` descriptions are written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Any,
}

/// A dynamically typed value.
///
/// `Tuple` and `List` are kept distinct even though they serialize the
/// same way, because `TypeSpec` type descriptions distinguish `list`
/// from `tuple` the way the original's `isinstance` checks do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Does this value satisfy `ty`, the way `isinstance(v, type_)` would?
    pub fn is_type(&self, ty: ValueType) -> bool {
        match (self, ty) {
            (_, ValueType::Any) => true,
            (Value::Bool(_), ValueType::Bool) => true,
            // Python's bool is a subtype of int; mirror that for numeric checks.
            (Value::Bool(_), ValueType::Int) => true,
            (Value::Int(_), ValueType::Int) => true,
            (Value::Float(_), ValueType::Float) => true,
            (Value::Str(_), ValueType::Str) => true,
            (Value::List(_), ValueType::List) => true,
            (Value::Tuple(_), ValueType::Tuple) => true,
            (Value::Dict(_), ValueType::Dict) => true,
            _ => false,
        }
    }

    /// The elements reached by descending one level into this value,
    /// the way `check_input`'s flattening step does: dict values for a
    /// `dict`-typed level, element iteration for `list`/`tuple`.
    pub fn sub_items(&self) -> Vec<&Value> {
        match self {
            Value::List(items) | Value::Tuple(items) => items.iter().collect(),
            Value::Dict(map) => map.values().collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_satisfies_int_like_python() {
        assert!(Value::Bool(true).is_type(ValueType::Int));
    }

    #[test]
    fn sub_items_flattens_list_and_dict() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.sub_items().len(), 2);

        let mut map = BTreeMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::Int(2));
        let dict = Value::Dict(map);
        assert_eq!(dict.sub_items().len(), 2);

        assert!(Value::Int(1).sub_items().is_empty());
    }
}
