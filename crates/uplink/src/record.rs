// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Measurement metadata records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type tag stamped on every record.
pub const RECORD_TYPE: &str = "measurement";

const TYPE_FIELD: &str = "type";
const FILENAME_FIELD: &str = "filename";

/// Structured measurement metadata destined for the remote document store.
///
/// A record is a free-form field map, always tagged `type = "measurement"`.
/// If it carries a `filename`, the upload coordinator records segment files
/// for it; the filename field is rewritten to each segment's own name before
/// that segment's header is framed. Everything else is immutable once the
/// save has been issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementRecord {
    fields: Map<String, Value>,
}

impl MeasurementRecord {
    /// Build a record from raw fields, forcing the measurement type tag.
    pub fn new(fields: Map<String, Value>) -> Self {
        let mut record = Self { fields };
        record.tag_type();
        record
    }

    /// Stamp the measurement type tag. Idempotent; the coordinator re-stamps
    /// records that arrived through deserialization.
    pub(crate) fn tag_type(&mut self) {
        self.fields.insert(
            TYPE_FIELD.to_string(),
            Value::String(RECORD_TYPE.to_string()),
        );
    }

    /// The filename field, if the record names one.
    pub fn filename(&self) -> Option<&str> {
        self.fields.get(FILENAME_FIELD).and_then(Value::as_str)
    }

    /// Rewrite the filename field to the current segment name.
    pub(crate) fn set_filename(&mut self, name: &str) {
        self.fields
            .insert(FILENAME_FIELD.to_string(), Value::String(name.to_string()));
    }

    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Canonical JSON encoding of the record.
    ///
    /// Fields are stored key-ordered, so the same record always encodes to
    /// the same bytes.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.fields)
    }
}
