// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Typed view of the fuel price API payload.
//!
//! The API answers with a loosely typed JSON document. It is decoded once,
//! right after the fetch, into the structures below so that nothing past the
//! coordinator ever touches a raw `serde_json::Value`:
//!
//! ```json
//! {"errorCode": 200, "data": [{"nameOfFuel": "Benzin", "priceAvg": "510.1", ...}]}
//! ```
//!
//! Price fields stay as [`PriceField`] because the API mixes numbers and
//! numeric strings, and coercion failures must surface at read time.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::consts::SUCCESS_ERROR_CODE;
use crate::errors::{FetchError, FetchResult, FieldError};

pub const FIELD_NAME: &str = "nameOfFuel";
pub const FIELD_PRICE_AVG: &str = "priceAvg";
pub const FIELD_PRICE_MIN: &str = "priceMin";
pub const FIELD_PRICE_MAX: &str = "priceMax";
pub const FIELD_INFO: &str = "infoOflabel";

/// Stable per-fuel key: display name lower-cased with spaces replaced by `_`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuelKey(String);

impl FuelKey {
    pub fn from_name(name: &str) -> Self {
        Self(name.to_lowercase().replace(' ', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FuelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A price value as the API delivered it
#[derive(Debug, Clone, PartialEq)]
pub enum PriceField {
    Absent,
    Number(f64),
    Text(String),
    /// Any other JSON type (null, bool, array, object)
    Other(&'static str),
}

impl PriceField {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::Number(n)) => n.as_f64().map_or(Self::Other("number"), Self::Number),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Other(json_type_name(other)),
        }
    }

    /// Coerce to `f64`; an absent field is an error
    pub fn coerce(&self, field: &'static str) -> Result<f64, FieldError> {
        match self {
            Self::Absent => Err(FieldError::Missing(field)),
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse::<f64>().map_err(|_| FieldError::NotNumeric {
                field,
                value: s.clone(),
            }),
            Self::Other(type_name) => Err(FieldError::WrongType { field, type_name }),
        }
    }

    /// Coerce to `f64`, using `default` when the field is absent
    pub fn coerce_or(&self, field: &'static str, default: f64) -> Result<f64, FieldError> {
        match self {
            Self::Absent => Ok(default),
            _ => self.coerce(field),
        }
    }
}

/// One fuel type's price statistics
#[derive(Debug, Clone, PartialEq)]
pub struct FuelEntry {
    pub name: String,
    pub key: FuelKey,
    pub price_avg: PriceField,
    pub price_min: PriceField,
    pub price_max: PriceField,
    /// Free-text annotation, empty when the API omits it
    pub info: String,
}

impl FuelEntry {
    /// Validate one element of the `data` array; `nameOfFuel` must be a string
    fn from_json(value: &Value) -> Result<Self, String> {
        let Value::Object(record) = value else {
            return Err(format!("expected a record, got {}", json_type_name(value)));
        };

        let (Some(name), true) = (record.get(FIELD_NAME), record.contains_key(FIELD_PRICE_AVG))
        else {
            return Err(format!("record lacks `{FIELD_NAME}` or `{FIELD_PRICE_AVG}`"));
        };
        let Value::String(name) = name else {
            return Err(format!(
                "`{FIELD_NAME}` must be a string, got {}",
                json_type_name(name)
            ));
        };
        let name = name.clone();

        Ok(Self {
            key: FuelKey::from_name(&name),
            name,
            price_avg: PriceField::from_json(record.get(FIELD_PRICE_AVG)),
            price_min: PriceField::from_json(record.get(FIELD_PRICE_MIN)),
            price_max: PriceField::from_json(record.get(FIELD_PRICE_MAX)),
            info: info_text(record),
        })
    }
}

fn info_text(record: &Map<String, Value>) -> String {
    match record.get(FIELD_INFO) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Element of `data` that failed shape validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

/// The `data` member of a report
#[derive(Debug, Clone, PartialEq)]
pub enum FuelData {
    Missing,
    /// Present but not an array; holds the JSON type found instead
    NotAList(&'static str),
    List {
        entries: Vec<FuelEntry>,
        rejected: Vec<RejectedRecord>,
    },
}

/// A successful, validated API response
#[derive(Debug, Clone, PartialEq)]
pub struct FuelPriceReport {
    pub data: FuelData,
}

impl FuelPriceReport {
    /// Decode a raw response body
    pub fn from_slice(body: &[u8]) -> FetchResult<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_json(&value)
    }

    /// Validate an already decoded document
    pub fn from_json(value: &Value) -> FetchResult<Self> {
        let Value::Object(document) = value else {
            return Err(FetchError::NotAnObject(json_type_name(value)));
        };

        let error_code = document.get("errorCode");
        if !error_code.is_some_and(is_success_code) {
            return Err(FetchError::Rejected(error_code.cloned()));
        }

        let data = match document.get("data") {
            None => FuelData::Missing,
            Some(Value::Array(items)) => {
                let mut entries = Vec::with_capacity(items.len());
                let mut rejected = Vec::new();
                for (index, item) in items.iter().enumerate() {
                    match FuelEntry::from_json(item) {
                        Ok(entry) => entries.push(entry),
                        Err(reason) => rejected.push(RejectedRecord { index, reason }),
                    }
                }
                FuelData::List { entries, rejected }
            }
            Some(other) => FuelData::NotAList(json_type_name(other)),
        };

        let report = Self { data };
        for key in report.duplicate_keys() {
            warn!("⚠️ Duplicate fuel identity in report: {}", key);
        }
        debug!(
            "Decoded report: {} entries, {} rejected",
            report.entries().len(),
            report.rejected().len()
        );
        Ok(report)
    }

    /// Whether the document carried a `data` member at all
    pub fn has_data(&self) -> bool {
        !matches!(self.data, FuelData::Missing)
    }

    /// Accepted entries in payload order (empty unless `data` is a list)
    pub fn entries(&self) -> &[FuelEntry] {
        match &self.data {
            FuelData::List { entries, .. } => entries,
            FuelData::Missing | FuelData::NotAList(_) => &[],
        }
    }

    pub fn rejected(&self) -> &[RejectedRecord] {
        match &self.data {
            FuelData::List { rejected, .. } => rejected,
            FuelData::Missing | FuelData::NotAList(_) => &[],
        }
    }

    /// First entry carrying the given identity
    pub fn find(&self, key: &FuelKey) -> Option<&FuelEntry> {
        self.find_nth(key, 0)
    }

    /// The `occurrence`-th entry (zero based) carrying the given identity
    pub fn find_nth(&self, key: &FuelKey, occurrence: usize) -> Option<&FuelEntry> {
        self.entries()
            .iter()
            .filter(|entry| &entry.key == key)
            .nth(occurrence)
    }

    /// Identities that occur more than once, in order of first repetition
    pub fn duplicate_keys(&self) -> Vec<FuelKey> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for entry in self.entries() {
            if !seen.insert(&entry.key) && !duplicates.contains(&entry.key) {
                duplicates.push(entry.key.clone());
            }
        }
        duplicates
    }
}

/// `200` and `200.0` both count, a string `"200"` does not
fn is_success_code(code: &Value) -> bool {
    code.as_i64() == Some(SUCCESS_ERROR_CODE)
        || code
            .as_f64()
            .is_some_and(|c| (c - 200.0).abs() < f64::EPSILON)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
