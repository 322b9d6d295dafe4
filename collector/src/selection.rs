//! # Field Selector
//!
//! Turns the operator's comma-separated field list into an [`ExportSelection`].
//! The result never depends on the order of the input: fields always come out in
//! registry order, so two configurations naming the same fields export the same
//! metrics in the same order.

use crate::{
    error::ConfigurationError,
    fields::{
        FieldRegistry,
        ServerMetricField,
    },
};
use std::fmt;

/// The fields chosen for export, unique by name, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSelection {
    fields: Vec<ServerMetricField>,
}

impl ExportSelection {
    pub fn fields(&self) -> &[ServerMetricField] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerMetricField> {
        self.fields.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ExportSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.fields.iter().map(|field| field.name).collect();
        f.write_str(&names.join(","))
    }
}

impl FieldRegistry {
    /// Validate a field list such as `"qcur, scur,status"`.
    ///
    /// Empty (or whitespace-only) input selects the default-enabled fields. Tokens
    /// may be field names or classic HAProxy field numbers. Any empty token, unknown
    /// name or repeated field fails the whole call.
    pub fn select(&self, field_list: &str) -> Result<ExportSelection, ConfigurationError> {
        if field_list.trim().is_empty() {
            return Ok(ExportSelection {
                fields: self.defaults().copied().collect(),
            });
        }

        let mut chosen = vec![false; self.fields().len()];
        for (position, token) in field_list.split(',').enumerate() {
            let token = token.trim();
            if token.is_empty() {
                return Err(ConfigurationError::EmptyField(position + 1));
            }
            let index = self
                .index_of(token)
                .ok_or_else(|| ConfigurationError::UnknownField(token.to_string()))?;
            if std::mem::replace(&mut chosen[index], true) {
                return Err(ConfigurationError::DuplicateField(self.fields()[index].name.to_string()));
            }
        }

        let fields = self
            .fields()
            .iter()
            .zip(chosen)
            .filter_map(|(field, selected)| selected.then_some(*field))
            .collect();
        Ok(ExportSelection { fields })
    }
}
