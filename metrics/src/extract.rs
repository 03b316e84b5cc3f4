//! Maps a PerfServlet PMI document onto [`ServerRecord`]s.
//!
//! Only the `Stat` sections listed in [`Section`] are read, everything else
//! in the document is skipped. Optional readings that are absent simply
//! leave the record field unset. A matched element that lacks an attribute
//! the mapping relies on fails the whole document.

use crate::record::{
    Destination,
    ServerRecord,
    ThreadPool,
};
use roxmltree::{
    Document,
    Node,
    ParsingOptions,
};
use std::str::FromStr;
use strum::EnumString;

/// Session modules of the PerfServlet application itself are not reported.
pub const PROBE_APP_PREFIX: &str = "perfServletApp";

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("PerfServlet document is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{element}> element is missing the `{attribute}` attribute")]
    MissingAttribute { element: String, attribute: &'static str },
    #[error("`{attribute}` of statistic {statistic:?} is not a number: {value:?}")]
    NotANumber {
        statistic: String,
        attribute: &'static str,
        value: String,
    },
}

type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// PMI modules we collect, by their `Stat` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
enum Section {
    #[strum(serialize = "JVM Runtime")]
    Jvm,
    #[strum(serialize = "WebContainer")]
    WebContainer,
    #[strum(serialize = "Object Request Broker")]
    RequestBroker,
    #[strum(serialize = "JDBC Connection Pools")]
    ConnectionPools,
    #[strum(serialize = "Servlet Session Manager")]
    Sessions,
    #[strum(serialize = "SIB Service")]
    Messaging,
    #[strum(serialize = "Security Authentication")]
    Authentication,
    #[strum(serialize = "Security Authorization")]
    Authorization,
}

impl Section {
    fn apply(self, record: &mut ServerRecord, stat: Node<'_, '_>) -> Result<()> {
        match self {
            Section::Jvm => jvm(record, stat),
            Section::WebContainer => {
                let (pool, hung) = thread_pool(stat)?;
                record.web_container = pool;
                if hung.is_some() {
                    record.web_container_hung_threads = hung;
                }
                Ok(())
            }
            Section::RequestBroker => {
                record.orb = thread_pool(stat)?.0;
                Ok(())
            }
            Section::ConnectionPools => connection_pools(record, stat),
            Section::Sessions => sessions(record, stat),
            Section::Messaging => messaging(record, stat),
            Section::Authentication => {
                if let Some(time) = find_statistic(stat, "WebAuthenticationTime")? {
                    record.security.authentication_time = Some(ms_to_s(reading(time, "max")?));
                }
                Ok(())
            }
            Section::Authorization => {
                if let Some(time) = find_statistic(stat, "WebAuthorizationTime")? {
                    record.security.authorization_time = Some(ms_to_s(reading(time, "max")?));
                }
                Ok(())
            }
        }
    }
}

/// Parses a PerfServlet response. The servlet prefixes its output with a
/// `DOCTYPE` declaration, so DTDs are accepted (and not resolved).
pub fn parse_document(xml: &str) -> Result<Document<'_>, roxmltree::Error> {
    Document::parse_with_options(
        xml,
        ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        },
    )
}

/// Parses a whole document and returns one record per `Node`/`Server` pair,
/// in document order.
pub fn extract(xml: &str) -> Result<Vec<ServerRecord>> {
    let document = parse_document(xml)?;
    let mut records = Vec::new();
    for node in elements(document.root(), "Node") {
        let node_name = required_attr(node, "name")?;
        for server in elements(node, "Server") {
            let mut record = ServerRecord::new(node_name, required_attr(server, "name")?);
            populate(&mut record, server)?;
            debug!(server = %record.key(), "Extracted server metrics");
            records.push(record);
        }
    }
    Ok(records)
}

/// Fills `record` from every known section found below a `Server` element.
pub fn populate(record: &mut ServerRecord, server: Node<'_, '_>) -> Result<()> {
    for stat in elements(server, "Stat") {
        let name = required_attr(stat, "name")?;
        if let Ok(section) = Section::from_str(name) {
            trace!(?section, server = %record.name, "Reading section");
            section.apply(record, stat)?;
        }
    }
    Ok(())
}

fn jvm(record: &mut ServerRecord, stat: Node<'_, '_>) -> Result<()> {
    for statistic in statistics(stat) {
        match required_attr(statistic, "name")? {
            "HeapSize" => record.heap.max_mb = Some(kb_to_mb(reading(statistic, "upperBound")?)),
            "UsedMemory" => record.heap.used_mb = Some(kb_to_mb(reading(statistic, "count")?)),
            _ => {}
        }
    }
    Ok(())
}

/// Active threads, pool upper bound and, when reported, the hung thread count.
fn thread_pool(stat: Node<'_, '_>) -> Result<(ThreadPool, Option<u64>)> {
    let mut pool = ThreadPool::default();
    let mut hung = None;
    for statistic in statistics(stat) {
        match required_attr(statistic, "name")? {
            "ActiveCount" => pool.active = Some(reading(statistic, "value")?),
            "PoolSize" => pool.pool_size = Some(reading(statistic, "upperBound")?),
            "ConcurrentHungThreadCount" => hung = Some(reading(statistic, "value")?),
            _ => {}
        }
    }
    Ok((pool, hung))
}

fn connection_pools(record: &mut ServerRecord, stat: Node<'_, '_>) -> Result<()> {
    let pools = &mut record.connection_pools;
    for provider in child_stats(stat) {
        for pool in child_stats(provider) {
            let jndi = required_attr(pool, "name")?.to_string();
            if let Some(percent) = find_statistic(pool, "PercentUsed")? {
                pools.percent_used.insert(jndi.clone(), reading(percent, "value")?);
            }
            if let Some(use_time) = find_statistic(pool, "UseTime")? {
                pools.use_time.insert(jndi.clone(), ms_to_s(reading(use_time, "max")?));
            }
            if let Some(wait_time) = find_statistic(pool, "WaitTime")? {
                pools.wait_time.insert(jndi.clone(), ms_to_s(reading(wait_time, "max")?));
            }
            if let Some(waiting) = find_statistic(pool, "WaitingThreadCount")? {
                pools.waiting_threads.insert(jndi, reading(waiting, "value")?);
            }
        }
    }
    Ok(())
}

fn sessions(record: &mut ServerRecord, stat: Node<'_, '_>) -> Result<()> {
    let sessions = &mut record.sessions;
    for module in child_stats(stat) {
        let name = required_attr(module, "name")?;
        if name.starts_with(PROBE_APP_PREFIX) {
            continue;
        }
        if let Some(active) = find_statistic(module, "ActiveCount")? {
            sessions.active.insert(name.to_string(), reading(active, "value")?);
        }
        if let Some(live) = find_statistic(module, "LiveCount")? {
            sessions.live.insert(name.to_string(), reading(live, "value")?);
        }
    }
    for total in child_statistics(stat) {
        match required_attr(total, "name")? {
            "ActiveCount" => sessions.total_active = Some(reading(total, "value")?),
            "LiveCount" => sessions.total_live = Some(reading(total, "value")?),
            _ => {}
        }
    }
    Ok(())
}

fn messaging(record: &mut ServerRecord, stat: Node<'_, '_>) -> Result<()> {
    let Some(engines) = find_stat(stat, "SIB Messaging Engines")? else {
        return Ok(());
    };
    // A server hosts at most one messaging engine.
    let Some(engine) = child_stats(engines).next() else {
        return Ok(());
    };
    let engine_name = required_attr(engine, "name")?;
    let queues = find_stat(engine, "Queues")?;
    let topic_spaces = find_stat(engine, "Topicspaces")?;
    if queues.is_none() && topic_spaces.is_none() {
        debug!(engine = engine_name, server = %record.name, "Messaging engine has no destinations");
        record.messaging.inactive_engines.push(engine_name.to_string());
        return Ok(());
    }

    for queue in queues.into_iter().flat_map(child_stats) {
        let name = required_attr(queue, "name")?;
        let consumed = child_statistic(queue, "QueueStats.TotalMessagesConsumedCount")?;
        let available = child_statistic(queue, "QueueStats.AvailableMessageCount")?;
        if let (Some(consumed), Some(available)) = (consumed, available) {
            record.messaging.add_destination(Destination::queue(
                name,
                engine_name,
                reading(consumed, "count")?,
                reading(available, "count")?,
            ));
        }
    }

    for topic_space in topic_spaces.into_iter().flat_map(child_stats) {
        let name = required_attr(topic_space, "name")?;
        let mut consumed = None;
        let mut available = None;
        for child in child_stats(topic_space) {
            if consumed.is_none() {
                consumed = child_statistic(child, "DurableSubscriptionStats.TotalMessagesConsumedCount")?;
            }
            if available.is_none() {
                available = child_statistic(child, "DurableSubscriptionStats.AvailableMessageCount")?;
            }
        }
        let (Some(consumed), Some(available)) = (consumed, available) else {
            continue;
        };
        let mut subscribers = Vec::new();
        for group in child_stats(topic_space) {
            if required_attr(group, "name")? != "Durable Subscriptions" {
                continue;
            }
            for subscriber in child_stats(group) {
                subscribers.push(required_attr(subscriber, "name")?.to_string());
            }
        }
        record.messaging.add_destination(Destination::topic_space(
            name,
            engine_name,
            reading(consumed, "count")?,
            reading(available, "count")?,
            subscribers,
        ));
    }
    Ok(())
}

fn kb_to_mb(kb: u64) -> u64 {
    kb / 1024
}

fn ms_to_s(ms: u64) -> u64 {
    ms / 1000
}

/// Descendant elements with the given tag, excluding `node` itself.
fn elements<'a, 'input: 'a>(node: Node<'a, 'input>, tag: &'static str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.tag_name().name() == tag)
}

fn child_stats<'a, 'input: 'a>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "Stat")
}

fn is_statistic(node: &Node<'_, '_>) -> bool {
    node.is_element() && node.tag_name().name().ends_with("Statistic")
}

fn statistics<'a, 'input: 'a>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(is_statistic)
}

fn child_statistics<'a, 'input: 'a>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(is_statistic)
}

/// First `Stat` below `scope` with the given name.
fn find_stat<'a, 'input: 'a>(scope: Node<'a, 'input>, name: &str) -> Result<Option<Node<'a, 'input>>> {
    for stat in elements(scope, "Stat") {
        if required_attr(stat, "name")? == name {
            return Ok(Some(stat));
        }
    }
    Ok(None)
}

/// First statistic anywhere below `scope` with the given name.
fn find_statistic<'a, 'input: 'a>(scope: Node<'a, 'input>, name: &str) -> Result<Option<Node<'a, 'input>>> {
    for statistic in statistics(scope) {
        if required_attr(statistic, "name")? == name {
            return Ok(Some(statistic));
        }
    }
    Ok(None)
}

/// Statistic directly under `scope` with the given name.
fn child_statistic<'a, 'input: 'a>(scope: Node<'a, 'input>, name: &str) -> Result<Option<Node<'a, 'input>>> {
    for statistic in child_statistics(scope) {
        if required_attr(statistic, "name")? == name {
            return Ok(Some(statistic));
        }
    }
    Ok(None)
}

fn required_attr<'a, 'input: 'a>(node: Node<'a, 'input>, attribute: &'static str) -> Result<&'a str> {
    node.attribute(attribute)
        .ok_or_else(|| ExtractError::MissingAttribute {
            element: node.tag_name().name().to_string(),
            attribute,
        })
}

/// Numeric attribute of a statistic. Decimal readings are truncated.
fn reading(statistic: Node<'_, '_>, attribute: &'static str) -> Result<u64> {
    let value = required_attr(statistic, attribute)?.trim();
    if let Ok(number) = value.parse::<u64>() {
        return Ok(number);
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() && number >= 0.0 => Ok(number.trunc() as u64),
        _ => Err(ExtractError::NotANumber {
            statistic: statistic.attribute("name").unwrap_or_default().to_string(),
            attribute,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DestinationKind;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    const FIXTURE: &str = include_str!("../fixtures/perfservlet.xml");

    fn fixture_records() -> Vec<ServerRecord> {
        extract(FIXTURE).unwrap()
    }

    fn map(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn one_record_per_server() {
        let keys: Vec<_> = fixture_records().iter().map(ServerRecord::key).collect();
        assert_eq!(keys, ["node01.server1", "node02.server2"]);
    }

    #[test]
    fn heap_is_truncated_to_megabytes() {
        let record = &fixture_records()[0];
        assert_eq!(record.heap.max_mb, Some(1000));
        assert_eq!(record.heap.used_mb, Some(750));

        let xml = r#"<PerformanceMonitor><Node name="n"><Server name="s">
            <Stat name="JVM Runtime">
              <BoundedRangeStatistic name="HeapSize" upperBound="1025023" value="1025023"/>
              <CountStatistic name="UsedMemory" count="2047"/>
            </Stat></Server></Node></PerformanceMonitor>"#;
        let record = &extract(xml).unwrap()[0];
        assert_eq!(record.heap.max_mb, Some(1000));
        assert_eq!(record.heap.used_mb, Some(1));
    }

    #[test]
    fn doctype_declaration_is_accepted() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE PerformanceMonitor SYSTEM "/wasPerfTool/dtd/performancemonitor.dtd">
<PerformanceMonitor responseStatus="success"><Node name="n"><Server name="s"/></Node></PerformanceMonitor>"#;
        let records = extract(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "n.s");
    }

    #[test]
    fn thread_pools() {
        let record = &fixture_records()[0];
        assert_eq!(record.web_container.active, Some(37));
        assert_eq!(record.web_container.pool_size, Some(200));
        assert_eq!(record.web_container_hung_threads, Some(2));
        assert_eq!(record.orb.active, Some(9));
        assert_eq!(record.orb.pool_size, Some(50));
    }

    #[test]
    fn connection_pools_from_every_provider() {
        let pools = &fixture_records()[0].connection_pools;
        assert_eq!(
            pools.percent_used,
            map(&[("jdbc/AuditDS", 95), ("jdbc/LegacyDS", 80), ("jdbc/OrdersDS", 40)])
        );
        assert_eq!(pools.use_time, map(&[("jdbc/OrdersDS", 4)]));
        assert_eq!(pools.wait_time, map(&[("jdbc/OrdersDS", 1)]));
        assert_eq!(pools.waiting_threads, map(&[("jdbc/OrdersDS", 3)]));
    }

    #[test]
    fn sessions_skip_the_probe_application() {
        let sessions = &fixture_records()[0].sessions;
        assert_eq!(sessions.active, map(&[("orders#orders-web.war", 10)]));
        assert_eq!(
            sessions.live,
            map(&[("audit#audit-web.war", 30), ("orders#orders-web.war", 100)])
        );
        assert_eq!(sessions.total_active, Some(12));
        assert_eq!(sessions.total_live, Some(130));
    }

    #[test]
    fn security_times_in_seconds() {
        let security = &fixture_records()[0].security;
        assert_eq!(security.authentication_time, Some(2));
        assert_eq!(security.authorization_time, Some(0));
    }

    #[test]
    fn destinations_need_both_counters() {
        let messaging = &fixture_records()[0].messaging;
        let names: Vec<_> = messaging.destinations.keys().cloned().collect();
        assert_eq!(names, ["Default.Topic.Space", "OrdersQueue"]);
        assert_eq!(
            messaging.destinations["OrdersQueue"],
            Destination::queue("OrdersQueue", "node01.server1-OrdersBus", 5120, 42)
        );
        assert!(messaging.inactive_engines.is_empty());
    }

    #[test]
    fn topic_space_keeps_subscribers_in_document_order() {
        let topic = &fixture_records()[0].messaging.destinations["Default.Topic.Space"];
        assert_eq!(topic.messages_consumed, 77);
        assert_eq!(topic.available_messages, 5);
        assert_eq!(
            topic.kind,
            DestinationKind::TopicSpace {
                subscribers: vec!["billing-sub".into(), "audit-sub".into(), "billing-sub".into()],
            }
        );
    }

    #[test]
    fn engine_without_destinations_is_recorded_inactive() {
        let record = &fixture_records()[1];
        assert!(record.messaging.destinations.is_empty());
        assert_eq!(record.messaging.inactive_engines, ["node02.server2-OrdersBus"]);
        assert!(record.messaging.is_inactive());
    }

    #[test]
    fn absent_sections_leave_fields_unset() {
        let record = &fixture_records()[1];
        assert_eq!(record.heap.max_mb, None);
        assert_eq!(record.web_container.active, None);
        assert_eq!(record.sessions.total_live, None);
        assert!(record.connection_pools.percent_used.is_empty());
    }

    #[test]
    fn missing_value_attribute_fails_the_document() {
        let xml = r#"<PerformanceMonitor responseStatus="success"><Node name="n"><Server name="s">
            <Stat name="JVM Runtime"><BoundedRangeStatistic name="HeapSize"/></Stat>
        </Server></Node></PerformanceMonitor>"#;
        let err = extract(xml).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingAttribute {
                attribute: "upperBound",
                ..
            }
        ));
    }

    #[test]
    fn unnamed_server_fails_the_document() {
        let xml = r#"<PerformanceMonitor><Node name="n"><Server/></Node></PerformanceMonitor>"#;
        assert!(matches!(
            extract(xml),
            Err(ExtractError::MissingAttribute { attribute: "name", .. })
        ));
    }

    #[test]
    fn non_numeric_reading_fails_the_document() {
        let xml = r#"<PerformanceMonitor><Node name="n"><Server name="s">
            <Stat name="Object Request Broker"><BoundedRangeStatistic name="ActiveCount" value="lots"/></Stat>
        </Server></Node></PerformanceMonitor>"#;
        assert!(matches!(extract(xml), Err(ExtractError::NotANumber { .. })));
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let xml = r#"<PerformanceMonitor><Node name="n"><Server name="s">
            <Stat name="Dynamic Caching"><CountStatistic name="Hits" count="oops"/></Stat>
        </Server></Node></PerformanceMonitor>"#;
        let records = extract(xml).unwrap();
        assert_eq!(records, vec![ServerRecord::new("n", "s")]);
    }

    #[test]
    fn broken_xml_is_an_error() {
        assert!(matches!(extract("<PerformanceMonitor>"), Err(ExtractError::Xml(_))));
    }
}
