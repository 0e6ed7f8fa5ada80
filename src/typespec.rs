// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 PenchY contributors

//! Typing of the inputs and outputs of a [`crate::element::PipelineElement`].
//!
//! Grounded on `penchy/jobs/typecheck.py`'s `Types` class: a
//! description is `(name, type, *subtypes)`, where each subtype after
//! the first narrows one level deeper into the previous type's
//! contents (a `dict`'s values, a `list`/`tuple`'s elements).

use crate::error::{PenchyError, PenchyResult};
use crate::value::{Value, ValueType};
use std::collections::{HashMap, HashSet};

/// A named argument's required shape: the outer type, followed by zero
/// or more subtypes describing nested contents.
#[derive(Debug, Clone)]
pub struct TypeDescription {
    pub name: String,
    pub types: Vec<ValueType>,
}

impl TypeDescription {
    pub fn new(name: impl Into<String>, types: Vec<ValueType>) -> Self {
        let types = if types.is_empty() {
            vec![ValueType::Any]
        } else {
            types
        };
        Self {
            name: name.into(),
            types,
        }
    }
}

/// Type specification for a `PipelineElement`'s inputs or outputs.
///
/// An empty `TypeSpec` (built from `TypeSpec::unchecked()`) disables
/// checking entirely, the way passing no arguments to `Types()` does.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    descriptions: Option<HashMap<String, Vec<ValueType>>>,
}

impl PartialEq for TypeSpec {
    fn eq(&self, other: &Self) -> bool {
        self.descriptions == other.descriptions
    }
}

impl TypeSpec {
    /// Build a `TypeSpec` from a list of `(name, type, *subtypes)`
    /// descriptions.
    pub fn new(descriptions: Vec<TypeDescription>) -> Self {
        if descriptions.is_empty() {
            return Self { descriptions: None };
        }
        let mut map = HashMap::new();
        for td in descriptions {
            if map.contains_key(&td.name) {
                tracing::warn!(name = %td.name, "overriding type description for duplicate name");
            }
            map.insert(td.name, td.types);
        }
        Self {
            descriptions: Some(map),
        }
    }

    /// Disable type checking entirely.
    pub fn unchecked() -> Self {
        Self { descriptions: None }
    }

    pub fn is_unchecked(&self) -> bool {
        self.descriptions.is_none()
    }

    pub fn names(&self) -> HashSet<String> {
        self.descriptions
            .as_ref()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check that `kwargs` satisfies this specification: every
    /// required name is present and has the right (nested) type.
    ///
    /// Returns the count of unused (unexpected) inputs, and logs a
    /// warning for each one, exactly as `check_input` does.
    pub fn check_input(&self, kwargs: &HashMap<String, Value>) -> PenchyResult<usize> {
        let descriptions = match &self.descriptions {
            Some(d) => d,
            None => return Ok(0),
        };

        for (name, types) in descriptions {
            let count = types.len();
            let root = kwargs
                .get(name)
                .ok_or_else(|| PenchyError::MissingArgument { name: name.clone() })?;

            let mut values: Vec<&Value> = vec![root];
            for (i, ty) in types.iter().enumerate() {
                if values.iter().any(|v| !v.is_type(*ty)) {
                    return Err(PenchyError::TypeMismatch {
                        name: name.clone(),
                        expected: format!("{:?}", types),
                    });
                }
                if i == count - 1 {
                    break;
                }
                values = values.iter().flat_map(|v| v.sub_items()).collect();
            }
        }

        let mut unused_inputs = 0;
        for name in kwargs.keys() {
            if !descriptions.contains_key(name) {
                unused_inputs += 1;
                tracing::warn!(%name, "unknown input");
            }
        }

        Ok(unused_inputs)
    }

    /// Check that piping `self` (the source) into `other` (the sink)
    /// with `mapping` (source-name -> sink-name pairs, or the identity
    /// mapping when `None`) is valid: every sink input ends up
    /// saturated except `"environment"`, which every sink receives
    /// implicitly.
    pub fn check_pipe(&self, other: &TypeSpec, mapping: Option<&[(String, String)]>) -> bool {
        let (source_descriptions, sink_descriptions) =
            match (&self.descriptions, &other.descriptions) {
                (Some(s), Some(o)) => (s, o),
                _ => return true,
            };

        let mapping: Vec<(String, String)> = match mapping {
            Some(m) => m.to_vec(),
            None => source_descriptions
                .keys()
                .map(|name| (name.clone(), name.clone()))
                .collect(),
        };

        let mut valid = true;
        let mut missing_inputs: HashSet<String> = sink_descriptions.keys().cloned().collect();

        for (source, sink) in &mapping {
            if !source_descriptions.contains_key(source) {
                tracing::error!(%source, "source has no such output");
                valid = false;
            }
            if !sink_descriptions.contains_key(sink) {
                tracing::warn!(%sink, "sink has no such input");
            }
            missing_inputs.remove(sink);
        }

        for input in missing_inputs {
            if input == "environment" {
                continue;
            }
            tracing::error!(%input, "sink input not saturated");
            valid = false;
        }

        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn unchecked_accepts_anything() {
        let spec = TypeSpec::unchecked();
        assert_eq!(spec.check_input(&HashMap::new()).unwrap(), 0);
    }

    #[test]
    fn missing_argument_is_reported() {
        let spec = TypeSpec::new(vec![TypeDescription::new("x", vec![ValueType::Int])]);
        let err = spec.check_input(&HashMap::new()).unwrap_err();
        assert!(matches!(err, PenchyError::MissingArgument { name } if name == "x"));
    }

    #[test]
    fn nested_list_of_dicts_of_int_is_checked() {
        let spec = TypeSpec::new(vec![TypeDescription::new(
            "rows",
            vec![ValueType::List, ValueType::Dict, ValueType::Int],
        )]);

        let mut row1 = std::collections::BTreeMap::new();
        row1.insert("a".to_string(), Value::Int(1));
        let mut row2 = std::collections::BTreeMap::new();
        row2.insert("b".to_string(), Value::Int(2));
        let rows = Value::List(vec![Value::Dict(row1), Value::Dict(row2)]);

        let input = kwargs(vec![("rows", rows)]);
        assert_eq!(spec.check_input(&input).unwrap(), 0);
    }

    #[test]
    fn wrong_nested_type_is_rejected() {
        let spec = TypeSpec::new(vec![TypeDescription::new(
            "rows",
            vec![ValueType::List, ValueType::Int],
        )]);
        let rows = Value::List(vec![Value::Str("not an int".into())]);
        let input = kwargs(vec![("rows", rows)]);
        assert!(matches!(
            spec.check_input(&input),
            Err(PenchyError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unused_inputs_are_counted() {
        let spec = TypeSpec::new(vec![TypeDescription::new("x", vec![ValueType::Int])]);
        let input = kwargs(vec![("x", Value::Int(1)), ("y", Value::Int(2))]);
        assert_eq!(spec.check_input(&input).unwrap(), 1);
    }

    #[test]
    fn check_pipe_exempts_environment() {
        let source = TypeSpec::new(vec![TypeDescription::new("out", vec![ValueType::Int])]);
        let sink = TypeSpec::new(vec![
            TypeDescription::new("in", vec![ValueType::Int]),
            TypeDescription::new("environment", vec![ValueType::Dict]),
        ]);
        let mapping = vec![("out".to_string(), "in".to_string())];
        assert!(source.check_pipe(&sink, Some(&mapping)));
    }

    #[test]
    fn check_pipe_flags_unsaturated_sink_input() {
        let source = TypeSpec::new(vec![TypeDescription::new("out", vec![ValueType::Int])]);
        let sink = TypeSpec::new(vec![
            TypeDescription::new("in", vec![ValueType::Int]),
            TypeDescription::new("other", vec![ValueType::Int]),
        ]);
        let mapping = vec![("out".to_string(), "in".to_string())];
        assert!(!source.check_pipe(&sink, Some(&mapping)));
    }
}
