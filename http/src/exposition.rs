//! # Exposition
//!
//! Renders one scrape's samples in the Prometheus text format. A fresh
//! [`Registry`] is built per request, so series of servers that disappeared from
//! HAProxy are never reported again.

use haproxy_exporter_collector::{
    MetricSample,
    MetricType,
};
use prometheus::{
    core::Collector,
    CounterVec,
    Encoder as _,
    GaugeVec,
    Opts,
    Registry,
    TextEncoder,
};
use std::collections::HashMap;

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

impl Family {
    fn new(sample: &MetricSample) -> Result<Self, prometheus::Error> {
        let opts = Opts::new(sample.name.clone(), sample.help);
        let label_names: Vec<&str> = sample.labels.iter().map(|(name, _)| *name).collect();
        Ok(match sample.metric_type {
            MetricType::Gauge => Family::Gauge(GaugeVec::new(opts, &label_names)?),
            MetricType::Counter => Family::Counter(CounterVec::new(opts, &label_names)?),
        })
    }

    fn observe(&self, sample: &MetricSample) -> Result<(), prometheus::Error> {
        let values: Vec<&str> = sample.labels.iter().map(|(_, value)| value.as_str()).collect();
        match self {
            Family::Gauge(vec) => vec.get_metric_with_label_values(&values)?.set(sample.value),
            Family::Counter(vec) => {
                if sample.value < 0.0 {
                    debug!(name = %sample.name, value = sample.value, "dropping negative counter value");
                    return Ok(());
                }
                let counter = vec.get_metric_with_label_values(&values)?;
                counter.reset();
                counter.inc_by(sample.value);
            }
        }
        Ok(())
    }

    fn boxed(self) -> Box<dyn Collector> {
        match self {
            Family::Gauge(vec) => Box::new(vec),
            Family::Counter(vec) => Box::new(vec),
        }
    }
}

/// Metrics of a single exposition request.
#[derive(Default)]
pub struct Exposition {
    registry: Registry,
}

impl Exposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every sample, grouping them into families by name.
    pub fn add_samples(&mut self, samples: &[MetricSample]) -> Result<(), prometheus::Error> {
        let mut families: Vec<Family> = Vec::new();
        let mut by_name = HashMap::<&str, usize>::new();

        for sample in samples {
            let index = match by_name.get(sample.name.as_str()) {
                Some(index) => *index,
                None => {
                    families.push(Family::new(sample)?);
                    by_name.insert(&sample.name, families.len() - 1);
                    families.len() - 1
                }
            };
            if let Err(error) = families[index].observe(sample) {
                warn!(%error, name = %sample.name, "skipping inconsistent sample");
            }
        }

        for family in families {
            self.registry.register(family.boxed())?;
        }
        Ok(())
    }

    pub fn add_collector(&mut self, collector: Box<dyn Collector>) -> Result<(), prometheus::Error> {
        self.registry.register(collector)
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
