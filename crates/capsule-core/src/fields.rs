//! Typed access to Capsule custom fields.
//!
//! Capsule attaches custom fields to a record as a list of
//! `{definition: {name}, value}` entries. [`FieldMap`] indexes that list
//! once and offers typed accessors; a field that is missing or whose value
//! does not parse yields `None`, never an error. Callers decide what a
//! missing field means (for the allocation calculator: skip the record).

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The definition half of a Capsule custom field: just its display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Display name of the field, e.g. `"KO Date"`.
    pub name: String,
}

/// One custom field on a Capsule record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    /// The field definition (name).
    pub definition: FieldDefinition,
    /// The field value; shape depends on the field type.
    #[serde(default)]
    pub value: Value,
}

/// Name-indexed view over a record's custom fields.
///
/// Built once per record; the first entry wins when a name repeats, matching
/// a first-match linear scan.
#[derive(Debug)]
pub struct FieldMap<'a> {
    by_name: HashMap<&'a str, &'a Value>,
}

impl<'a> FieldMap<'a> {
    /// Index the given field list by definition name.
    pub fn new(fields: &'a [CustomField]) -> Self {
        let mut by_name = HashMap::with_capacity(fields.len());
        for field in fields {
            by_name
                .entry(field.definition.name.as_str())
                .or_insert(&field.value);
        }
        Self { by_name }
    }

    /// Raw value of a field, if present.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.by_name.get(name).copied()
    }

    /// Field value as an ISO-8601 date.
    ///
    /// Accepts plain `YYYY-MM-DD` and datetime forms with a `T` time part
    /// (Capsule serialises date fields both ways depending on endpoint).
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        let value = self.raw(name)?.as_str()?;
        let date_part = value.split('T').next().unwrap_or(value);
        date_part.parse().ok()
    }

    /// Field value as a number.
    ///
    /// Accepts JSON numbers and numeric strings; anything else is `None`.
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.raw(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
