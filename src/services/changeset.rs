use crate::api::error::AppError;
use crate::services::asset_lifecycle::UploadedFile;
use crate::services::faq::{Faq, encode_faqs, parse_faqs};
use crate::services::resource::{FieldKind, FieldSpec, Presence};
use sea_orm::Value;
use std::collections::HashMap;

/// Request body of a create/update call, whatever its encoding.
///
/// `fields` maps a form key to its value; `None` is an explicit JSON `null`.
#[derive(Debug, Default)]
pub struct FormPayload {
    pub fields: HashMap<String, Option<String>>,
    pub files: Vec<UploadedFile>,
}

/// Per-field intent of a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    /// Field omitted: the stored value stays.
    Unchanged,
    /// Field sent empty or null: the stored value becomes NULL.
    Clear,
    Set(T),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i32),
    Faqs(Vec<Faq>),
}

impl FieldValue {
    pub fn into_value(self) -> Value {
        match self {
            FieldValue::Text(s) => s.into(),
            FieldValue::Integer(n) => n.into(),
            FieldValue::Faqs(faqs) => encode_faqs(&faqs).into(),
        }
    }
}

/// Typed NULL for a column of the given kind.
pub fn null_value(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text | FieldKind::Faqs => Option::<String>::None.into(),
        FieldKind::Integer => Option::<i32>::None.into(),
    }
}

pub fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<(FieldSpec, Patch<FieldValue>)>,
    removals: Vec<&'static str>,
}

impl ChangeSet {
    /// Reads declared fields out of a request body. Undeclared keys are ignored.
    pub fn parse(
        fields: &[FieldSpec],
        slots: &[&'static str],
        input: &HashMap<String, Option<String>>,
    ) -> Result<Self, AppError> {
        let mut changes = Vec::with_capacity(fields.len());

        for spec in fields {
            let patch = match input.get(spec.name) {
                None => Patch::Unchanged,
                Some(raw) => parse_field(spec, raw.as_deref())?,
            };
            changes.push((*spec, patch));
        }

        let removals = slots
            .iter()
            .copied()
            .filter(|slot| {
                input
                    .get(&format!("remove_{}", slot))
                    .and_then(|v| v.as_deref())
                    .is_some_and(truthy)
            })
            .collect();

        Ok(Self { changes, removals })
    }

    /// Fails with the list of required fields that were not given a value.
    pub fn ensure_complete(&self) -> Result<(), AppError> {
        let missing: Vec<&str> = self
            .changes
            .iter()
            .filter(|(spec, patch)| {
                spec.presence == Presence::Required && !matches!(patch, Patch::Set(_))
            })
            .map(|(spec, _)| spec.name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!("Missing required fields: {}", missing.join(", "))))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FieldSpec, Patch<FieldValue>)> {
        self.changes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Patch<FieldValue>> {
        self.changes
            .iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, patch)| patch)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Patch::Set(FieldValue::Text(s))) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i32> {
        match self.get(name) {
            Some(Patch::Set(FieldValue::Integer(n))) => Some(*n),
            _ => None,
        }
    }

    /// Column values to write on insert. Defaulted fields fall back to their default.
    pub fn insert_values(&self) -> Vec<(&'static str, Value)> {
        self.changes
            .iter()
            .filter_map(|(spec, patch)| match (patch, spec.presence) {
                (Patch::Set(v), _) => Some((spec.name, v.clone().into_value())),
                (_, Presence::Defaulted(d)) => Some((spec.name, d.into())),
                (Patch::Clear, Presence::Optional) => Some((spec.name, null_value(spec.kind))),
                _ => None,
            })
            .collect()
    }

    /// Column values to write on update. Omitted fields are left out.
    pub fn update_values(&self) -> Vec<(&'static str, Value)> {
        self.changes
            .iter()
            .filter_map(|(spec, patch)| match patch {
                Patch::Unchanged => None,
                Patch::Clear => Some((spec.name, null_value(spec.kind))),
                Patch::Set(v) => Some((spec.name, v.clone().into_value())),
            })
            .collect()
    }

    /// Slots the caller asked to empty via `remove_<slot>`.
    pub fn removals(&self) -> &[&'static str] {
        &self.removals
    }
}

fn parse_field(spec: &FieldSpec, raw: Option<&str>) -> Result<Patch<FieldValue>, AppError> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => {
            return match spec.presence {
                Presence::Optional => Ok(Patch::Clear),
                _ => Err(AppError::Validation(format!("{} cannot be empty", spec.name))),
            };
        }
    };

    let value = match spec.kind {
        FieldKind::Text => FieldValue::Text(raw.to_string()),
        FieldKind::Integer => raw.trim().parse::<i32>().map(FieldValue::Integer).map_err(|_| {
            AppError::Validation(format!("{} must be an integer", spec.name))
        })?,
        FieldKind::Faqs => FieldValue::Faqs(parse_faqs(raw)?),
    };

    Ok(Patch::Set(value))
}
