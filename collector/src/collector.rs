//! # Collector
//!
//! Runs one fetch → parse → map cycle per call and reports the exporter's own
//! health next to the HAProxy samples.
//!
//! A single lock is held for the whole cycle, so concurrent callers queue up and
//! each runs its own fresh scrape once the previous one finished. Nothing from a
//! cycle is kept except the cumulative counters.

use crate::{
    error::ScrapeError,
    fetch::{
        StatsFetcher,
        StatsSource,
    },
    mapper::{
        Mapper,
        MetricSample,
    },
    parser,
    selection::ExportSelection,
    NAMESPACE,
};
use std::time::{
    Duration,
    Instant,
};
use tokio::sync::Mutex;

/// Counters accumulated over the life of the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeTotals {
    pub scrapes: u64,
    pub failures: u64,
    pub parse_warnings: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub duration: Duration,
    pub row_count: usize,
    pub warning_count: usize,
}

/// Everything one collection cycle produced.
#[derive(Debug)]
pub struct Scrape {
    pub outcome: ScrapeOutcome,
    pub totals: ScrapeTotals,
    /// Entity samples; empty when the scrape failed.
    pub samples: Vec<MetricSample>,
    pub error: Option<ScrapeError>,
}

impl Scrape {
    pub fn meta_samples(&self) -> Vec<MetricSample> {
        let up = if self.outcome.success { 1.0 } else { 0.0 };
        vec![
            MetricSample::gauge(
                format!("{NAMESPACE}_up"),
                "Was the last scrape of HAProxy successful.",
                up,
            ),
            MetricSample::gauge(
                format!("{NAMESPACE}_exporter_scrape_duration_seconds"),
                "Duration of the last scrape of HAProxy.",
                self.outcome.duration.as_secs_f64(),
            ),
            MetricSample::gauge(
                format!("{NAMESPACE}_exporter_scraped_rows"),
                "Number of stats rows read in the last scrape.",
                self.outcome.row_count as f64,
            ),
            MetricSample::counter(
                format!("{NAMESPACE}_exporter_total_scrapes"),
                "Current total HAProxy scrapes.",
                self.totals.scrapes as f64,
            ),
            MetricSample::counter(
                format!("{NAMESPACE}_exporter_scrape_failures_total"),
                "Number of HAProxy scrapes that failed.",
                self.totals.failures as f64,
            ),
            MetricSample::counter(
                format!("{NAMESPACE}_exporter_csv_parse_failures"),
                "Number of errors while parsing CSV.",
                self.totals.parse_warnings as f64,
            ),
        ]
    }

    /// Meta samples followed by the entity samples.
    pub fn into_samples(self) -> Vec<MetricSample> {
        let mut samples = self.meta_samples();
        samples.extend(self.samples);
        samples
    }
}

struct Cycle {
    samples: Vec<MetricSample>,
    row_count: usize,
    warning_count: usize,
}

pub struct Collector<S = StatsFetcher> {
    source: S,
    selection: ExportSelection,
    totals: Mutex<ScrapeTotals>,
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S, selection: ExportSelection) -> Self {
        Self {
            source,
            selection,
            totals: Mutex::new(ScrapeTotals::default()),
        }
    }

    pub fn selection(&self) -> &ExportSelection {
        &self.selection
    }

    pub fn target(&self) -> &str {
        self.source.target()
    }

    /// Run one complete cycle. Waits for any cycle already in flight.
    ///
    /// Scrape failures are reported through the returned [`Scrape`], never as an error.
    #[instrument(level = "debug", skip_all, fields(scrape_uri = self.source.target()))]
    pub async fn collect(&self) -> Scrape {
        let mut totals = self.totals.lock().await;
        let started = Instant::now();
        let result = self.scrape().await;
        totals.scrapes += 1;

        let (outcome, samples, error) = match result {
            Ok(cycle) => {
                totals.parse_warnings += cycle.warning_count as u64;
                let outcome = ScrapeOutcome {
                    success: true,
                    duration: started.elapsed(),
                    row_count: cycle.row_count,
                    warning_count: cycle.warning_count,
                };
                debug!(
                    rows = cycle.row_count,
                    warnings = cycle.warning_count,
                    samples = cycle.samples.len(),
                    "scraped HAProxy"
                );
                (outcome, cycle.samples, None)
            }
            Err(error) => {
                totals.failures += 1;
                error!(%error, kind = error.kind(), "can't scrape HAProxy");
                let outcome = ScrapeOutcome {
                    success: false,
                    duration: started.elapsed(),
                    row_count: 0,
                    warning_count: 0,
                };
                (outcome, Vec::new(), Some(error))
            }
        };

        Scrape {
            outcome,
            totals: *totals,
            samples,
            error,
        }
    }

    async fn scrape(&self) -> Result<Cycle, ScrapeError> {
        trace!("fetching");
        let body = self.source.fetch().await?;

        trace!(bytes = body.len(), "parsing");
        let text = String::from_utf8_lossy(&body);
        let table = parser::parse(&text).map_err(|source| ScrapeError::Parse {
            target: self.source.target().to_string(),
            source,
        })?;

        trace!(columns = table.header().width(), "mapping");
        let mapper = Mapper::new(&self.selection, table.header());
        let mut rows = table.rows();
        let mut samples = Vec::new();
        let mut row_count = 0;
        for row in rows.by_ref() {
            row_count += 1;
            samples.extend(mapper.map(&row));
        }

        Ok(Cycle {
            samples,
            row_count,
            warning_count: rows.warnings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::ScrapeTarget,
        fields::FieldRegistry,
    };
    use pretty_assertions::assert_eq;
    use std::{
        future::Future,
        pin::Pin,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
    };

    struct StaticSource(Result<&'static str, u16>);

    impl StatsSource for StaticSource {
        fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ScrapeError>> + Send + '_>> {
            Box::pin(async move {
                match self.0 {
                    Ok(body) => Ok(body.as_bytes().to_vec()),
                    Err(status) => Err(ScrapeError::HttpStatus {
                        target: self.target().to_string(),
                        status,
                    }),
                }
            })
        }

        fn target(&self) -> &str {
            "static"
        }
    }

    /// Answers after a delay with a body unique to the call.
    #[derive(Default)]
    struct SlowSource {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StatsSource for SlowSource {
        fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ScrapeError>> + Send + '_>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(format!("pxname,svname,scur\nproxy_{call},srv,{call}\nproxy_{call},srv2,{call}\n").into_bytes())
            })
        }

        fn target(&self) -> &str {
            "slow"
        }
    }

    /// Never answers its first fetch.
    #[derive(Default)]
    struct StallsOnce {
        calls: AtomicUsize,
    }

    impl StatsSource for StallsOnce {
        fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ScrapeError>> + Send + '_>> {
            Box::pin(async move {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    std::future::pending::<()>().await;
                }
                Ok(b"pxname,svname,scur\nbackend_a,srv1,1\n".to_vec())
            })
        }

        fn target(&self) -> &str {
            "stalls"
        }
    }

    fn collector<S: StatsSource>(source: S, fields: &str) -> Collector<S> {
        Collector::new(source, FieldRegistry::builtin().select(fields).unwrap())
    }

    fn meta(scrape: &Scrape, name: &str) -> f64 {
        scrape
            .meta_samples()
            .into_iter()
            .find(|sample| sample.name == name)
            .map(|sample| sample.value)
            .unwrap()
    }

    #[tokio::test]
    async fn successful_scrape() {
        let collector = collector(
            StaticSource(Ok(
                "pxname,svname,status,qcur,scur\nfrontend_a,FRONTEND,OPEN,,5\nbackend_a,srv1,UP,0,2\n",
            )),
            "qcur,scur",
        );
        let scrape = collector.collect().await;

        assert_eq!(meta(&scrape, "haproxy_up"), 1.0);
        assert_eq!(meta(&scrape, "haproxy_exporter_scrape_failures_total"), 0.0);
        assert_eq!(meta(&scrape, "haproxy_exporter_scraped_rows"), 2.0);
        assert_eq!(scrape.outcome.row_count, 2);
        assert_eq!(scrape.outcome.warning_count, 0);
        assert!(scrape.error.is_none());

        let entity: Vec<_> = scrape
            .samples
            .iter()
            .map(|sample| (sample.name.as_str(), sample.label("proxy"), sample.label("server"), sample.value))
            .collect();
        assert_eq!(
            entity,
            vec![
                ("haproxy_frontend_current_sessions", Some("frontend_a"), None, 5.0),
                ("haproxy_server_current_queue", Some("backend_a"), Some("srv1"), 0.0),
                ("haproxy_server_current_sessions", Some("backend_a"), Some("srv1"), 2.0),
            ]
        );
    }

    #[tokio::test]
    async fn corrupted_row_keeps_scrape_up() {
        let collector = collector(
            StaticSource(Ok("pxname,svname,scur\na,s1,1\na,s2,2,3,4\na,s3,3\n")),
            "scur",
        );
        let scrape = collector.collect().await;
        assert!(scrape.outcome.success);
        assert_eq!(scrape.outcome.row_count, 2);
        assert_eq!(scrape.outcome.warning_count, 1);
        assert_eq!(scrape.samples.len(), 2);

        let again = collector.collect().await;
        assert_eq!(meta(&again, "haproxy_exporter_csv_parse_failures"), 2.0);
        assert_eq!(meta(&again, "haproxy_exporter_total_scrapes"), 2.0);
    }

    #[tokio::test]
    async fn failed_fetch_reports_only_meta_samples() {
        let collector = collector(StaticSource(Err(500)), "");
        let scrape = collector.collect().await;
        assert!(!scrape.outcome.success);
        assert!(scrape.samples.is_empty());
        assert_eq!(meta(&scrape, "haproxy_up"), 0.0);
        assert_eq!(meta(&scrape, "haproxy_exporter_scrape_failures_total"), 1.0);
        assert!(matches!(scrape.error, Some(ScrapeError::HttpStatus { status: 500, .. })));

        let scrape = collector.collect().await;
        assert_eq!(scrape.totals.failures, 2);
        assert_eq!(scrape.into_samples().len(), 6);
    }

    #[tokio::test]
    async fn unparseable_stats_fail_the_scrape() {
        let collector = collector(StaticSource(Ok("<html>login required</html>")), "");
        let scrape = collector.collect().await;
        assert_eq!(meta(&scrape, "haproxy_up"), 0.0);
        assert!(matches!(scrape.error, Some(ScrapeError::Parse { .. })));
    }

    #[tokio::test]
    async fn reachable_balancer_without_rows_is_up() {
        let collector = collector(StaticSource(Ok("# pxname,svname,scur,\n")), "");
        let scrape = collector.collect().await;
        assert_eq!(meta(&scrape, "haproxy_up"), 1.0);
        assert!(scrape.samples.is_empty());
    }

    #[tokio::test]
    async fn unreachable_balancer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = ScrapeTarget::parse(&format!("http://{addr}/;csv")).unwrap();
        let fetcher = StatsFetcher::new(target, Duration::from_secs(2), true).unwrap();
        let collector = collector(fetcher, "");
        let scrape = collector.collect().await;

        assert_eq!(meta(&scrape, "haproxy_up"), 0.0);
        assert_eq!(meta(&scrape, "haproxy_exporter_scrape_failures_total"), 1.0);
        assert!(scrape.samples.is_empty());
        assert_eq!(scrape.error.as_ref().map(ScrapeError::kind), Some("network"));
    }

    #[tokio::test]
    async fn abandoned_collection_is_not_counted() {
        let collector = collector(StallsOnce::default(), "scur");

        let abandoned = tokio::time::timeout(Duration::from_millis(20), collector.collect()).await;
        assert!(abandoned.is_err());
        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 1);

        let scrape = collector.collect().await;
        assert!(scrape.outcome.success);
        assert_eq!(scrape.totals, ScrapeTotals {
            scrapes: 1,
            failures: 0,
            parse_warnings: 0,
        });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_collections_run_one_at_a_time() {
        let collector = Arc::new(collector(SlowSource::default(), "scur"));

        let first = tokio::spawn({
            let collector = collector.clone();
            async move { collector.collect().await }
        });
        let second = tokio::spawn({
            let collector = collector.clone();
            async move { collector.collect().await }
        });
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert_eq!(collector.source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 2);

        let mut proxies = Vec::new();
        for scrape in [&first, &second] {
            assert!(scrape.outcome.success);
            assert_eq!(scrape.outcome.row_count, 2);
            let proxy = scrape.samples[0].label("proxy").unwrap().to_string();
            assert!(scrape.samples.iter().all(|sample| sample.label("proxy") == Some(proxy.as_str())));
            proxies.push(proxy);
        }
        proxies.sort();
        assert_eq!(proxies, vec!["proxy_1".to_string(), "proxy_2".to_string()]);

        let mut scrape_numbers = vec![first.totals.scrapes, second.totals.scrapes];
        scrape_numbers.sort();
        assert_eq!(scrape_numbers, vec![1, 2]);
    }
}
