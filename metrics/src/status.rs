use serde_repr::{
    Deserialize_repr,
    Serialize_repr,
};
use std::{
    cmp::Ordering,
    fmt,
};
use strum::Display;

/// Monitoring-plugin status. The discriminant is the process exit code.
#[derive(Debug, Clone, Copy, Display, Serialize_repr, Deserialize_repr, PartialEq, Eq, Hash)]
#[repr(u8)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Status {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns the worse of two states. `Unknown` does not take part in the
    /// ordering, so an incomparable pair keeps `self`.
    pub fn escalate(self, other: Status) -> Status {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }

    fn severity(self) -> Option<u8> {
        match self {
            Status::Ok => Some(0),
            Status::Warning => Some(1),
            Status::Critical => Some(2),
            Status::Unknown => None,
        }
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Warning and critical bounds for a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u64,
    pub critical: u64,
}

impl Thresholds {
    pub const fn new(warning: u64, critical: u64) -> Self {
        Self { warning, critical }
    }

    /// A warning bound above the critical bound could never report WARNING.
    pub fn is_ordered(&self) -> bool {
        self.warning <= self.critical
    }

    /// `v < warning` is OK, `warning <= v < critical` is WARNING and
    /// `v >= critical` is CRITICAL.
    pub fn classify(&self, value: u64) -> Status {
        if value >= self.critical {
            Status::Critical
        } else if value >= self.warning {
            Status::Warning
        } else {
            Status::Ok
        }
    }

    /// Perfdata suffix `;warning;critical`.
    pub(crate) fn perf_suffix(&self) -> String {
        format!(";{};{}", self.warning, self.critical)
    }
}

/// `floor(100 * used / capacity)`. A zero capacity has no percentage.
pub fn percent(used: u64, capacity: u64) -> Option<u64> {
    if capacity == 0 {
        return None;
    }
    used.checked_mul(100).map(|scaled| scaled / capacity)
}

/// Outcome of one check: status, human readable message and optional perfdata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
    pub perfdata: Option<String>,
}

impl CheckResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            perfdata: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Status::Critical, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Status::Unknown, message)
    }

    pub fn with_perfdata(mut self, perfdata: impl Into<String>) -> Self {
        let perfdata = perfdata.into();
        self.perfdata = (!perfdata.is_empty()).then_some(perfdata);
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status, self.message)?;
        if let Some(perfdata) = &self.perfdata {
            write!(f, " | {perfdata}")?;
        }
        Ok(())
    }
}

/// Quotes a perfdata label when it contains characters the plugin format reserves.
pub(crate) fn perf_label(label: &str) -> String {
    if label.chars().any(|c| c.is_whitespace() || c == '=' || c == '\'') {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
