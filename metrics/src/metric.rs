use crate::status::Thresholds;
use strum::{
    Display,
    EnumIter,
    EnumString,
};

/// The closed set of checks `show` can run against a stored server.
#[derive(Debug, Clone, Copy, Display, EnumIter, EnumString, PartialEq, Eq, Hash)]
pub enum Metric {
    WebContainer,
    WebContainerConcurrentHungThreadCount,
    #[strum(serialize = "ORB")]
    Orb,
    Heap,
    #[strum(serialize = "DBConnectionPool")]
    DbConnectionPool,
    #[strum(serialize = "DBConnectionPoolUseTime")]
    DbConnectionPoolUseTime,
    #[strum(serialize = "DBConnectionPoolWaitTime")]
    DbConnectionPoolWaitTime,
    #[strum(serialize = "DBConnectionPoolWaitingThreadCount")]
    DbConnectionPoolWaitingThreadCount,
    LiveSessions,
    #[strum(serialize = "SIBDestinations")]
    SibDestinations,
    SecurityAuthen,
    SecurityAuthor,
}

impl Metric {
    pub fn default_thresholds(self) -> Thresholds {
        match self {
            Metric::WebContainer | Metric::Orb | Metric::Heap | Metric::DbConnectionPool => Thresholds::new(75, 90),
            Metric::WebContainerConcurrentHungThreadCount => Thresholds::new(1, 5),
            Metric::DbConnectionPoolUseTime | Metric::DbConnectionPoolWaitTime => Thresholds::new(5, 10),
            Metric::DbConnectionPoolWaitingThreadCount => Thresholds::new(5, 10),
            Metric::SibDestinations => Thresholds::new(10, 100),
            Metric::SecurityAuthen | Metric::SecurityAuthor => Thresholds::new(2, 5),
            // Never compared.
            Metric::LiveSessions => Thresholds::new(u64::MAX, u64::MAX),
        }
    }

    /// Applies command-line overrides on top of the per-metric defaults.
    pub fn thresholds(self, warning: Option<u64>, critical: Option<u64>) -> Thresholds {
        let defaults = self.default_thresholds();
        Thresholds::new(warning.unwrap_or(defaults.warning), critical.unwrap_or(defaults.critical))
    }
}
