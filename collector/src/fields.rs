//! # Field Registry
//!
//! The catalog of per-entity HAProxy statistics columns the exporter knows how to
//! republish. Each entry names the CSV column it reads, the metric it produces and
//! which entity kinds populate that column.
//!
//! The registry is an ordinary value: it is built once at startup and handed by
//! reference to the selector and the mapper. Its order is the order of HAProxy's
//! own column documentation and never changes between runs.

use strum::{
    Display,
    EnumIter,
    IntoStaticStr,
};

/// Row category in the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Frontend,
    Backend,
    Server,
    Listener,
}

impl EntityKind {
    /// Resolve the numeric `type` column (`0` frontend, `1` backend, `2` server, `3` listener).
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim() {
            "0" => Some(EntityKind::Frontend),
            "1" => Some(EntityKind::Backend),
            "2" => Some(EntityKind::Server),
            "3" => Some(EntityKind::Listener),
            _ => None,
        }
    }

    /// Fallback for stats tables without a `type` column: HAProxy names the
    /// aggregate rows `FRONTEND` and `BACKEND`, everything else is a server.
    pub fn from_service_name(svname: &str) -> Self {
        match svname {
            "FRONTEND" => EntityKind::Frontend,
            "BACKEND" => EntityKind::Backend,
            _ => EntityKind::Server,
        }
    }

    /// Label carrying the instance name, if rows of this kind have one worth exporting.
    pub fn instance_label(&self) -> Option<&'static str> {
        match self {
            EntityKind::Server => Some("server"),
            EntityKind::Listener => Some("listener"),
            EntityKind::Frontend | EntityKind::Backend => None,
        }
    }

    /// Every value the `status` column can take for this kind.
    pub fn states(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Frontend => &["OPEN", "STOP"],
            EntityKind::Listener => &["OPEN", "WAITING", "FULL", "STOP"],
            EntityKind::Backend => &["UP", "DOWN"],
            EntityKind::Server => &["UP", "DOWN", "NOLB", "MAINT", "DRAIN", "no check"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Counter,
}

/// How the raw column value turns into samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Integer or float, one sample.
    Number,
    /// Enumerated state, one 0/1 gauge per possible state.
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerMetricField {
    /// Name used in the field selection, equal to the CSV column for built-in fields.
    pub name: &'static str,
    /// Column key in the stats header.
    pub column: &'static str,
    /// Field number in HAProxy's classic CSV layout.
    pub position: u16,
    /// Metric name without the `haproxy_<kind>_` prefix.
    pub metric_name: &'static str,
    pub metric_type: MetricType,
    pub value_kind: ValueKind,
    pub kinds: &'static [EntityKind],
    pub default_enabled: bool,
    pub const_label: Option<(&'static str, &'static str)>,
    pub help: &'static str,
}

impl ServerMetricField {
    const fn new(
        name: &'static str,
        position: u16,
        metric_type: MetricType,
        metric_name: &'static str,
        kinds: &'static [EntityKind],
        help: &'static str,
    ) -> Self {
        Self {
            name,
            column: name,
            position,
            metric_name,
            metric_type,
            value_kind: ValueKind::Number,
            kinds,
            default_enabled: true,
            const_label: None,
            help,
        }
    }

    const fn off_by_default(mut self) -> Self {
        self.default_enabled = false;
        self
    }

    const fn with_label(mut self, key: &'static str, value: &'static str) -> Self {
        self.const_label = Some((key, value));
        self
    }

    const fn as_state(mut self) -> Self {
        self.value_kind = ValueKind::State;
        self
    }

    pub fn applies_to(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Full metric name for a row of the given kind, e.g. `haproxy_server_current_queue`.
    pub fn metric_name_for(&self, kind: EntityKind) -> String {
        format!("{}_{}_{}", crate::NAMESPACE, kind, self.metric_name)
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

use EntityKind::{
    Backend as B,
    Frontend as F,
    Listener as L,
    Server as S,
};
use MetricType::{
    Counter,
    Gauge,
};

const FBSL: &[EntityKind] = &[F, B, S, L];
const FBS: &[EntityKind] = &[F, B, S];
const FBL: &[EntityKind] = &[F, B, L];
const FB: &[EntityKind] = &[F, B];
const FL: &[EntityKind] = &[F, L];
const BS: &[EntityKind] = &[B, S];
const ONLY_F: &[EntityKind] = &[F];
const ONLY_B: &[EntityKind] = &[B];
const ONLY_S: &[EntityKind] = &[S];

#[rustfmt::skip]
const BUILTIN: &[ServerMetricField] = &[
    ServerMetricField::new("qcur", 2, Gauge, "current_queue", BS, "Current number of queued requests."),
    ServerMetricField::new("qmax", 3, Gauge, "max_queue", BS, "Maximum observed number of queued requests."),
    ServerMetricField::new("scur", 4, Gauge, "current_sessions", FBSL, "Current number of active sessions."),
    ServerMetricField::new("smax", 5, Gauge, "max_sessions", FBSL, "Maximum observed number of active sessions."),
    ServerMetricField::new("slim", 6, Gauge, "limit_sessions", FBSL, "Configured session limit."),
    ServerMetricField::new("stot", 7, Counter, "sessions_total", FBSL, "Total number of sessions."),
    ServerMetricField::new("bin", 8, Counter, "bytes_in_total", FBSL, "Current total of incoming bytes."),
    ServerMetricField::new("bout", 9, Counter, "bytes_out_total", FBSL, "Current total of outgoing bytes."),
    ServerMetricField::new("dreq", 10, Counter, "requests_denied_total", FBL, "Total of requests denied for security."),
    ServerMetricField::new("dresp", 11, Counter, "responses_denied_total", FBSL, "Total of responses denied for security."),
    ServerMetricField::new("ereq", 12, Counter, "request_errors_total", FL, "Total of request errors."),
    ServerMetricField::new("econ", 13, Counter, "connection_errors_total", BS, "Total of connection errors."),
    ServerMetricField::new("eresp", 14, Counter, "response_errors_total", BS, "Total of response errors."),
    ServerMetricField::new("wretr", 15, Counter, "retry_warnings_total", BS, "Total of retry warnings."),
    ServerMetricField::new("wredis", 16, Counter, "redispatch_warnings_total", BS, "Total of redispatch warnings."),
    ServerMetricField::new("status", 17, Gauge, "status", FBSL, "Current status, one series per possible state (1 = active state).").as_state(),
    ServerMetricField::new("weight", 18, Gauge, "weight", BS, "Current weight."),
    ServerMetricField::new("act", 19, Gauge, "active_servers", ONLY_B, "Current number of active servers."),
    ServerMetricField::new("bck", 20, Gauge, "backup_servers", ONLY_B, "Current number of backup servers."),
    ServerMetricField::new("chkfail", 21, Counter, "check_failures_total", ONLY_S, "Total number of failed health checks."),
    ServerMetricField::new("chkdown", 22, Counter, "check_up_down_total", BS, "Total number of UP->DOWN transitions."),
    ServerMetricField::new("lastchg", 23, Gauge, "last_status_change_seconds", BS, "Seconds since the last UP<->DOWN transition.").off_by_default(),
    ServerMetricField::new("downtime", 24, Counter, "downtime_seconds_total", BS, "Total downtime in seconds."),
    ServerMetricField::new("qlimit", 25, Gauge, "queue_limit", ONLY_S, "Configured maxqueue for the server.").off_by_default(),
    ServerMetricField::new("throttle", 29, Gauge, "throttle_percent", ONLY_S, "Current throttle percentage for the server.").off_by_default(),
    ServerMetricField::new("lbtot", 30, Counter, "server_selected_total", BS, "Total number of times a server was selected."),
    ServerMetricField::new("rate", 33, Gauge, "current_session_rate", FBS, "Current number of sessions per second over last elapsed second."),
    ServerMetricField::new("rate_lim", 34, Gauge, "limit_session_rate", ONLY_F, "Configured limit on new sessions per second."),
    ServerMetricField::new("rate_max", 35, Gauge, "max_session_rate", FBS, "Maximum observed number of sessions per second."),
    ServerMetricField::new("check_duration", 38, Gauge, "check_duration_milliseconds", ONLY_S, "Previously run health check duration, in milliseconds."),
    ServerMetricField::new("hrsp_1xx", 39, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "1xx"),
    ServerMetricField::new("hrsp_2xx", 40, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "2xx"),
    ServerMetricField::new("hrsp_3xx", 41, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "3xx"),
    ServerMetricField::new("hrsp_4xx", 42, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "4xx"),
    ServerMetricField::new("hrsp_5xx", 43, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "5xx"),
    ServerMetricField::new("hrsp_other", 44, Counter, "http_responses_total", FBS, "Total of HTTP responses.").with_label("code", "other"),
    ServerMetricField::new("req_rate", 46, Gauge, "current_http_request_rate", ONLY_F, "Current HTTP requests per second over last elapsed second.").off_by_default(),
    ServerMetricField::new("req_rate_max", 47, Gauge, "max_http_request_rate", ONLY_F, "Maximum observed number of HTTP requests per second.").off_by_default(),
    ServerMetricField::new("req_tot", 48, Counter, "http_requests_total", FB, "Total HTTP requests."),
    ServerMetricField::new("cli_abrt", 49, Counter, "client_aborts_total", BS, "Total number of data transfers aborted by the client."),
    ServerMetricField::new("srv_abrt", 50, Counter, "server_aborts_total", BS, "Total number of data transfers aborted by the server."),
    ServerMetricField::new("comp_in", 51, Counter, "compressor_bytes_in_total", FB, "Number of HTTP response bytes fed to the compressor.").off_by_default(),
    ServerMetricField::new("comp_out", 52, Counter, "compressor_bytes_out_total", FB, "Number of HTTP response bytes emitted by the compressor.").off_by_default(),
    ServerMetricField::new("comp_byp", 53, Counter, "compressor_bytes_bypassed_total", FB, "Number of bytes that bypassed the HTTP compressor.").off_by_default(),
    ServerMetricField::new("comp_rsp", 54, Counter, "http_responses_compressed_total", FB, "Number of HTTP responses that were compressed.").off_by_default(),
    ServerMetricField::new("lastsess", 55, Gauge, "last_session_seconds", BS, "Seconds since the last session was assigned.").off_by_default(),
    ServerMetricField::new("qtime", 58, Gauge, "average_queue_time_milliseconds", BS, "Average queue time over the last 1024 requests, in milliseconds.").off_by_default(),
    ServerMetricField::new("ctime", 59, Gauge, "average_connect_time_milliseconds", BS, "Average connect time over the last 1024 requests, in milliseconds.").off_by_default(),
    ServerMetricField::new("rtime", 60, Gauge, "average_response_time_milliseconds", BS, "Average response time over the last 1024 requests, in milliseconds.").off_by_default(),
    ServerMetricField::new("ttime", 61, Gauge, "average_total_time_milliseconds", BS, "Average total session time over the last 1024 requests, in milliseconds.").off_by_default(),
    ServerMetricField::new("conn_rate", 77, Gauge, "current_connection_rate", ONLY_F, "Current number of connections per second over last elapsed second.").off_by_default(),
    ServerMetricField::new("conn_rate_max", 78, Gauge, "max_connection_rate", ONLY_F, "Maximum observed number of connections per second.").off_by_default(),
    ServerMetricField::new("conn_tot", 79, Counter, "connections_total", ONLY_F, "Total number of connections.").off_by_default(),
];

/// Immutable, ordered catalog of exportable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRegistry {
    fields: Vec<ServerMetricField>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldRegistry {
    /// The columns documented for HAProxy 1.5 through 2.x.
    pub fn builtin() -> Self {
        Self::new(BUILTIN.to_vec())
    }

    pub fn new(fields: Vec<ServerMetricField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[ServerMetricField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&ServerMetricField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Index of a field in registry order, looked up by name or classic field number.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        match field_number(token) {
            Some(position) => self.fields.iter().position(|field| field.position == position),
            None => self.fields.iter().position(|field| field.name == token),
        }
    }

    pub fn defaults(&self) -> impl Iterator<Item = &ServerMetricField> {
        self.fields.iter().filter(|field| field.default_enabled)
    }

    /// The default-enabled field names, comma-separated, in registry order.
    pub fn default_selection(&self) -> String {
        self.defaults().map(|field| field.name).collect::<Vec<_>>().join(",")
    }
}

/// Plain decimal digits only: `+2` and `02` are not field numbers.
fn field_number(token: &str) -> Option<u16> {
    let plain = !token.is_empty()
        && token.bytes().all(|byte| byte.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if plain { token.parse().ok() } else { None }
}
