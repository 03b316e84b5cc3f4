//! Threshold evaluation of stored server records.

use crate::{
    metric::Metric,
    record::{
        server_key,
        ServerRecord,
        ThreadPool,
    },
    status::{
        percent,
        perf_label,
        CheckResult,
        Status,
        Thresholds,
    },
    store::Store,
};
use std::collections::BTreeMap;

/// One `show` request against a server record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub metric: Metric,
    pub thresholds: Thresholds,
    /// JNDI name of a connection pool or name of a messaging destination.
    pub name: Option<String>,
}

impl Query {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            thresholds: metric.default_thresholds(),
            name: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Looks up `node.server` and evaluates the query against it.
pub fn check(store: &Store, node: &str, server: &str, query: &Query) -> CheckResult {
    let key = server_key(node, server);
    match store.get(&key) {
        Some(record) => evaluate(record, query),
        None => CheckResult::unknown(format!("Not available statistics for server {key}")),
    }
}

/// Evaluates a query. Reading the record never changes it.
pub fn evaluate(record: &ServerRecord, query: &Query) -> CheckResult {
    let thresholds = &query.thresholds;
    let name = query.name.as_deref();
    match query.metric {
        Metric::WebContainer => thread_pool(record, &record.web_container, "WebContainer", thresholds),
        Metric::Orb => thread_pool(record, &record.orb, "ORB", thresholds),
        Metric::Heap => heap(record, thresholds),
        Metric::WebContainerConcurrentHungThreadCount => hung_threads(record, thresholds),
        Metric::DbConnectionPool => match name {
            Some(jndi) => pool_percent_used(record, jndi, thresholds),
            None => all_pools_percent_used(record, thresholds),
        },
        Metric::DbConnectionPoolUseTime => pool_reading(
            record,
            &record.connection_pools.use_time,
            PoolReading::UseTime,
            name,
            thresholds,
        ),
        Metric::DbConnectionPoolWaitTime => pool_reading(
            record,
            &record.connection_pools.wait_time,
            PoolReading::WaitTime,
            name,
            thresholds,
        ),
        Metric::DbConnectionPoolWaitingThreadCount => pool_reading(
            record,
            &record.connection_pools.waiting_threads,
            PoolReading::WaitingThreads,
            name,
            thresholds,
        ),
        Metric::LiveSessions => live_sessions(record),
        Metric::SibDestinations => destination(record, name, thresholds),
        Metric::SecurityAuthen => security_time(
            record,
            record.security.authentication_time,
            "Authentication",
            thresholds,
        ),
        Metric::SecurityAuthor => security_time(
            record,
            record.security.authorization_time,
            "Authorization",
            thresholds,
        ),
    }
}

fn thread_pool(record: &ServerRecord, pool: &ThreadPool, label: &str, thresholds: &Thresholds) -> CheckResult {
    let usage = match (pool.active, pool.pool_size) {
        (Some(active), Some(size)) => percent(active, size).map(|p| (active, size, p)),
        _ => None,
    };
    let Some((active, size, used)) = usage else {
        return CheckResult::unknown(format!("Could not find {label} metrics for server {}", record.name));
    };
    CheckResult::new(
        thresholds.classify(used),
        format!("{label} Thread Pool: {active}/{size} ({used}%)"),
    )
    .with_perfdata(format!(
        "{}={used}%{} {}_active={active};;;0;{size}",
        label.to_lowercase(),
        thresholds.perf_suffix(),
        label.to_lowercase()
    ))
}

fn heap(record: &ServerRecord, thresholds: &Thresholds) -> CheckResult {
    let usage = match (record.heap.used_mb, record.heap.max_mb) {
        (Some(used), Some(max)) => percent(used, max).map(|p| (used, max, p)),
        _ => None,
    };
    let Some((used, max, used_percent)) = usage else {
        return CheckResult::unknown(format!("Could not find Heap Usage metrics for server {}", record.name));
    };
    CheckResult::new(
        thresholds.classify(used_percent),
        format!("Heap Usage: {used}/{max} MB ({used_percent}%)"),
    )
    .with_perfdata(format!(
        "heap={used_percent}%{} heap_used={used}MB;;;0;{max}",
        thresholds.perf_suffix()
    ))
}

fn hung_threads(record: &ServerRecord, thresholds: &Thresholds) -> CheckResult {
    let Some(hung) = record.web_container_hung_threads else {
        return CheckResult::unknown(format!(
            "Could not find WebContainer hung thread metrics for server {}",
            record.name
        ));
    };
    CheckResult::new(
        thresholds.classify(hung),
        format!("WebContainer Concurrent Hung Threads: {hung}"),
    )
    .with_perfdata(format!("hung_threads={hung}{}", thresholds.perf_suffix()))
}

fn all_pools_percent_used(record: &ServerRecord, thresholds: &Thresholds) -> CheckResult {
    let pools = &record.connection_pools.percent_used;
    if pools.is_empty() {
        return CheckResult::unknown(format!(
            "Could not find DB Connection Pool metrics for server {}",
            record.name
        ));
    }
    let mut status = Status::Ok;
    let mut message = String::from("DB Connection Pool Usage");
    let mut perfdata = Vec::with_capacity(pools.len());
    for (jndi, used) in pools {
        status = status.escalate(thresholds.classify(*used));
        message.push_str(&format!(" - {jndi} {used}%"));
        perfdata.push(format!("{}={used}%{}", perf_label(jndi), thresholds.perf_suffix()));
    }
    CheckResult::new(status, message).with_perfdata(perfdata.join(" "))
}

fn pool_percent_used(record: &ServerRecord, jndi: &str, thresholds: &Thresholds) -> CheckResult {
    let Some(used) = record.connection_pools.percent_used.get(jndi).copied() else {
        return CheckResult::unknown(format!(
            "DB Connection Pool {jndi} not found for server {}",
            record.name
        ));
    };
    CheckResult::new(
        thresholds.classify(used),
        format!("DB Connection Pool Usage - {jndi} {used}%"),
    )
    .with_perfdata(format!("{}={used}%{}", perf_label(jndi), thresholds.perf_suffix()))
}

#[derive(Debug, Clone, Copy)]
enum PoolReading {
    UseTime,
    WaitTime,
    WaitingThreads,
}

impl PoolReading {
    fn title(self) -> &'static str {
        match self {
            PoolReading::UseTime => "Use Time",
            PoolReading::WaitTime => "Wait Time",
            PoolReading::WaitingThreads => "Waiting Threads",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            PoolReading::UseTime | PoolReading::WaitTime => "s",
            PoolReading::WaitingThreads => "",
        }
    }
}

/// Per-pool readings other than percent used always need a JNDI name.
fn pool_reading(
    record: &ServerRecord,
    readings: &BTreeMap<String, u64>,
    kind: PoolReading,
    name: Option<&str>,
    thresholds: &Thresholds,
) -> CheckResult {
    let Some(jndi) = name else {
        return CheckResult::unknown("Please set datasource JNDI name using -j JndiName");
    };
    let Some(value) = readings.get(jndi).copied() else {
        return CheckResult::unknown(format!(
            "DB Connection Pool {} for {jndi} not found for server {}",
            kind.title(),
            record.name
        ));
    };
    let unit = kind.unit();
    CheckResult::new(
        thresholds.classify(value),
        format!("DB Connection Pool {} - {jndi} {value}{unit}", kind.title()),
    )
    .with_perfdata(format!("{}={value}{unit}{}", perf_label(jndi), thresholds.perf_suffix()))
}

/// Always OK when data is present: live sessions have no thresholds.
fn live_sessions(record: &ServerRecord) -> CheckResult {
    let sessions = &record.sessions;
    let Some(total) = sessions.total_live.filter(|_| !sessions.live.is_empty()) else {
        return CheckResult::unknown(format!(
            "Could not find Live Session metrics for server {}",
            record.name
        ));
    };
    let mut message = format!("live sessions: total {total}");
    let mut perfdata = vec![format!("total={total}")];
    for (module, live) in &sessions.live {
        message.push_str(&format!(" , {module} {live}"));
        perfdata.push(format!("{}={live}", perf_label(module)));
    }
    CheckResult::ok(message).with_perfdata(perfdata.join(" "))
}

fn destination(record: &ServerRecord, name: Option<&str>, thresholds: &Thresholds) -> CheckResult {
    let messaging = &record.messaging;
    if messaging.is_inactive() {
        return CheckResult::ok("Inactive SIB Message Engine");
    }
    let Some(name) = name else {
        return CheckResult::unknown("Please set destination Name using -d DestName");
    };
    if messaging.destinations.is_empty() {
        return CheckResult::unknown(format!(
            "Could not find Destination metrics for server {}",
            record.name
        ));
    }
    let Some(destination) = messaging.destinations.get(name) else {
        return CheckResult::unknown(format!("Destination {name} not found for server {}", record.name));
    };
    let available = destination.available_messages;
    let consumed = destination.messages_consumed;
    let mut message = format!(
        "Destination:{} - Available Messages:{available} , Messages Consumed:{consumed} ",
        destination.name
    );
    let subscribers = destination.subscribers();
    if !subscribers.is_empty() {
        message.push_str(" , Durable Subscribers:");
        for subscriber in subscribers {
            message.push_str(&format!("{subscriber} "));
        }
    }
    CheckResult::new(thresholds.classify(available), message).with_perfdata(format!(
        "available={available}{} consumed={consumed}c",
        thresholds.perf_suffix()
    ))
}

fn security_time(record: &ServerRecord, time: Option<u64>, label: &str, thresholds: &Thresholds) -> CheckResult {
    let Some(seconds) = time else {
        return CheckResult::unknown(format!(
            "Could not find Security {label} metrics for server {}",
            record.name
        ));
    };
    CheckResult::new(
        thresholds.classify(seconds),
        format!("Security {label} Max Time: {seconds}s"),
    )
    .with_perfdata(format!(
        "{}_time={seconds}s{}",
        label.to_lowercase(),
        thresholds.perf_suffix()
    ))
}
