use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// Store key of a server, unique within a cell.
pub fn server_key(node: &str, server: &str) -> String {
    format!("{node}.{server}")
}

/// Snapshot of one application server taken from a single PerfServlet document.
///
/// Every gauge stays `None` until the extractor has seen it, so a missing
/// reading is never confused with a zero reading. Heap values are in MB and
/// times in seconds, both truncated at extraction time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub node: String,
    pub name: String,
    #[serde(default)]
    pub heap: Heap,
    #[serde(default)]
    pub web_container: ThreadPool,
    #[serde(default)]
    pub web_container_hung_threads: Option<u64>,
    #[serde(default)]
    pub orb: ThreadPool,
    #[serde(default)]
    pub connection_pools: ConnectionPools,
    #[serde(default)]
    pub sessions: Sessions,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub messaging: Messaging,
}

impl ServerRecord {
    pub fn new(node: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> String {
        server_key(&self.node, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heap {
    pub max_mb: Option<u64>,
    pub used_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPool {
    pub active: Option<u64>,
    pub pool_size: Option<u64>,
}

/// Per connection pool readings, keyed by JNDI name. A pool only shows up in
/// the collections for which the document carried a reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPools {
    pub percent_used: BTreeMap<String, u64>,
    pub use_time: BTreeMap<String, u64>,
    pub wait_time: BTreeMap<String, u64>,
    pub waiting_threads: BTreeMap<String, u64>,
}

/// HTTP session counts, per application module and cell wide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sessions {
    pub active: BTreeMap<String, u64>,
    pub live: BTreeMap<String, u64>,
    pub total_active: Option<u64>,
    pub total_live: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub authentication_time: Option<u64>,
    pub authorization_time: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messaging {
    pub destinations: BTreeMap<String, Destination>,
    /// Engines that were present without any queue or topic space.
    pub inactive_engines: Vec<String>,
}

impl Messaging {
    pub fn add_destination(&mut self, destination: Destination) {
        self.destinations.insert(destination.name.clone(), destination);
    }

    pub fn is_inactive(&self) -> bool {
        self.destinations.is_empty() && !self.inactive_engines.is_empty()
    }
}

/// A messaging endpoint hosted by a message engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub engine: String,
    /// Messages consumed since the engine was last started.
    pub messages_consumed: u64,
    pub available_messages: u64,
    pub kind: DestinationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DestinationKind {
    Queue,
    TopicSpace {
        /// Durable subscribers in document order.
        subscribers: Vec<String>,
    },
}

impl Destination {
    pub fn queue(name: impl Into<String>, engine: impl Into<String>, consumed: u64, available: u64) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            messages_consumed: consumed,
            available_messages: available,
            kind: DestinationKind::Queue,
        }
    }

    pub fn topic_space(
        name: impl Into<String>,
        engine: impl Into<String>,
        consumed: u64,
        available: u64,
        subscribers: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            engine: engine.into(),
            messages_consumed: consumed,
            available_messages: available,
            kind: DestinationKind::TopicSpace { subscribers },
        }
    }

    pub fn subscribers(&self) -> &[String] {
        match &self.kind {
            DestinationKind::Queue => &[],
            DestinationKind::TopicSpace { subscribers } => subscribers,
        }
    }
}
