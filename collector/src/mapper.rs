//! # Metric Mapper
//!
//! Turns parsed stats rows into typed samples for the selected fields.

use crate::{
    fields::{
        EntityKind,
        MetricType,
        ServerMetricField,
        ValueKind,
    },
    parser::{
        parse_number,
        Header,
        StatRow,
    },
    selection::ExportSelection,
};

/// One observation, valid for a single scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
    pub metric_type: MetricType,
}

impl MetricSample {
    pub fn gauge(name: impl Into<String>, help: &'static str, value: f64) -> Self {
        Self {
            name: name.into(),
            help,
            labels: Vec::new(),
            value,
            metric_type: MetricType::Gauge,
        }
    }

    pub fn counter(name: impl Into<String>, help: &'static str, value: f64) -> Self {
        Self {
            metric_type: MetricType::Counter,
            ..Self::gauge(name, help, value)
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// The selection with every column resolved against one scrape's header.
#[derive(Debug)]
pub struct Mapper<'s> {
    fields: Vec<(&'s ServerMetricField, Option<usize>)>,
}

impl<'s> Mapper<'s> {
    pub fn new(selection: &'s ExportSelection, header: &Header<'_>) -> Self {
        let fields = selection
            .iter()
            .map(|field| (field, header.position(field.column)))
            .collect();
        Self { fields }
    }

    /// Samples for every selected field that applies to the row's kind and has a value.
    pub fn map(&self, row: &StatRow<'_>) -> Vec<MetricSample> {
        let kind = row.kind();
        let mut labels = vec![("proxy", row.proxy().to_string())];
        if let Some(instance_label) = kind.instance_label() {
            labels.push((instance_label, row.instance().to_string()));
        }

        let mut samples = Vec::new();
        for (field, position) in &self.fields {
            if !field.applies_to(kind) {
                continue;
            }
            let Some(raw) = position.and_then(|position| row.field(position)) else {
                continue;
            };
            match field.value_kind {
                ValueKind::Number => {
                    let Some(value) = parse_number(raw) else {
                        trace!(column = field.column, raw, proxy = row.proxy(), "ignoring non-numeric value");
                        continue;
                    };
                    let mut labels = labels.clone();
                    if let Some((key, value)) = field.const_label {
                        labels.push((key, value.to_string()));
                    }
                    samples.push(sample(field, kind, labels, value));
                }
                ValueKind::State => {
                    let active = normalize_state(raw);
                    if !kind.states().contains(&active) {
                        debug!(column = field.column, raw, proxy = row.proxy(), "unknown state");
                    }
                    for state in kind.states() {
                        let mut labels = labels.clone();
                        labels.push(("state", state.to_string()));
                        let value = if *state == active { 1.0 } else { 0.0 };
                        samples.push(sample(field, kind, labels, value));
                    }
                }
            }
        }
        samples
    }
}

fn sample(
    field: &ServerMetricField,
    kind: EntityKind,
    labels: Vec<(&'static str, String)>,
    value: f64,
) -> MetricSample {
    MetricSample {
        name: field.metric_name_for(kind),
        help: field.help,
        labels,
        value,
        metric_type: field.metric_type,
    }
}

/// `UP 1/3`, `MAINT (via app/web1)` and `MAINT(resolution)` reduce to their leading word.
fn normalize_state(raw: &str) -> &str {
    if raw.eq_ignore_ascii_case("no check") {
        return "no check";
    }
    raw.split([' ', '(']).next().unwrap_or(raw)
}
