//! Immutable snapshots handed to validators.
//!
//! A snapshot is a deep copy. Nothing done to the live record after
//! `freeze()` is visible through it, and it offers no way to mutate.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::record::{field_of, BodyValue, SubmissionRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadOnlySnapshot {
    name: String,
    email: String,
    subject: String,
    message: String,
    phone: String,
    body: BTreeMap<String, BodyValue>,
    meta: Map<String, Value>,
}

impl ReadOnlySnapshot {
    pub(crate) fn from_record(record: &SubmissionRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            subject: record.subject.clone(),
            message: record.message.clone(),
            phone: record.phone.clone(),
            body: record.body.clone(),
            meta: record.meta.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn body(&self) -> &BTreeMap<String, BodyValue> {
        &self.body
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// Look up one of the named scalar fields.
    pub fn field(&self, name: &str) -> Option<&str> {
        field_of(&self.name, &self.email, &self.subject, &self.message, &self.phone, name)
    }
}
