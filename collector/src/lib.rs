//! Retrieval side of the plugin: one PerfServlet request per run, the raw
//! snapshot written next to the cell store, and the store refreshed from it.

#[macro_use]
extern crate tracing;

mod client;
mod marker;

pub use client::{
    FetchError,
    PerfServletClient,
    Target,
    PERFSERVLET_PATH,
};
use eyre::{
    Context as _,
    Result,
};
pub use marker::FreshnessMarker;
use perfserv_monitor_config::{
    CellFiles,
    Config,
};
use perfserv_monitor_metrics::{
    extract,
    parse_document,
    CheckResult,
    Status,
    Store,
};
use std::{
    fs,
    path::Path,
    time::Duration,
};

/// Runs collection cycles for one cell.
#[derive(Debug)]
pub struct Collector {
    files: CellFiles,
    target: Target,
    refresh_interval: Duration,
    client: PerfServletClient,
}

impl Collector {
    pub fn new(config: &Config, cell: &str, target: Target) -> Result<Self> {
        let client = PerfServletClient::new(&target, config.request_timeout())?;
        Ok(Self {
            files: config.cell_files(cell),
            target,
            refresh_interval: config.refresh_interval(),
            client,
        })
    }

    /// Fetches the PerfServlet document and, when the cell reports success,
    /// replaces the cell's server records.
    ///
    /// Transport and upstream failures come back as a CRITICAL or UNKNOWN
    /// result. An `Err` means the document could not be turned into records
    /// or the store could not be written; the store is left untouched then.
    #[instrument(level = "info", skip(self), fields(cell = %self.files.cell))]
    pub fn run(&self) -> Result<CheckResult> {
        if let Some(dir) = self.files.marker.parent() {
            fs::create_dir_all(dir).wrap_err_with(|| format!("Failed to create runtime directory {dir:?}"))?;
        }
        let refresh = FreshnessMarker::new(&self.files.marker)
            .refresh_due(self.refresh_interval)
            .wrap_err_with(|| format!("Failed to update freshness marker {:?}", self.files.marker))?;
        let url = self.target.url(refresh)?;

        let body = match self.client.fetch(&self.target, &url) {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, error = %err, "PerfServlet request failed");
                return Ok(CheckResult::critical(format!("Could not open perfservlet URL - {err}")));
            }
        };
        fs::write(&self.files.xml, &body)
            .wrap_err_with(|| format!("Failed to write PerfServlet snapshot {:?}", self.files.xml))?;

        let result = response_status(&body);
        if result.status == Status::Ok {
            let servers = update_store(&body, &self.files.store)?;
            info!(servers, "Server store updated");
        } else {
            warn!(status = %result.status, message = %result.message, "PerfServlet did not report success");
        }
        Ok(result)
    }
}

/// Interprets the `responseStatus` attribute of the document root.
pub fn response_status(xml: &str) -> CheckResult {
    let document = match parse_document(xml) {
        Ok(document) => document,
        Err(err) => return CheckResult::unknown(format!("Could not parse PerfServlet response: {err}")),
    };
    match document.root_element().attribute("responseStatus") {
        Some("failed") => CheckResult::critical("Error retrieving PMI data! Check your Cell status!"),
        Some("success") => CheckResult::ok(format!(
            "PerfServlet Data refreshed on {}",
            chrono::Local::now().format("%c")
        )),
        Some(other) => CheckResult::unknown(format!("Unknown Perfserv Status: {other}")),
        None => CheckResult::unknown("Unknown Perfserv Status: responseStatus attribute missing"),
    }
}

/// Extracts every server first so a malformed document never reaches the store.
fn update_store(xml: &str, path: &Path) -> Result<usize> {
    let records = extract(xml).wrap_err("Could not extract PerfServlet metrics")?;
    let mut store = Store::open(path)?;
    let servers = records.len();
    for record in records {
        store.insert(record);
    }
    store.save()?;
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use httpmock::{
        Method::GET,
        MockServer,
    };
    use perfserv_monitor_config::{
        Args,
        Protocol,
    };
    use pretty_assertions::assert_eq;
    use std::{
        fs::OpenOptions,
        time::SystemTime,
    };
    use temp_dir::TempDir;

    const FIXTURE: &str = include_str!("../../metrics/fixtures/perfservlet.xml");

    fn config(runtime_dir: &Path) -> Config {
        let args = Args::try_parse_from([
            "perfservmon",
            "-C",
            "cell01",
            "--runtime-dir",
            runtime_dir.to_str().unwrap(),
            "retrieve",
            "-N",
            "localhost",
            "-P",
            "1",
        ])
        .unwrap();
        Config::new(args).unwrap()
    }

    fn target(server: &MockServer) -> Target {
        Target {
            host: server.host(),
            port: server.port(),
            protocol: Protocol::Http,
            username: String::new(),
            password: String::new(),
            ignore_cert: false,
        }
    }

    fn collector(dir: &TempDir, target: Target) -> Collector {
        Collector::new(&config(dir.path()), "cell01", target).unwrap()
    }

    #[test]
    fn success_populates_the_store() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path(PERFSERVLET_PATH);
            then.status(200).header("content-type", "text/xml").body(FIXTURE);
        });
        let dir = TempDir::new().unwrap();

        let result = collector(&dir, target(&server)).run().unwrap();

        mock.assert();
        assert_eq!(result.status, Status::Ok);
        assert!(result.message.starts_with("PerfServlet Data refreshed on "));
        assert_eq!(fs::read_to_string(dir.child("cell01.xml")).unwrap(), FIXTURE);
        assert!(dir.child("cell01.lck").exists());
        let store = Store::open_read_only(dir.child("cell01.json")).unwrap();
        assert_eq!(store.keys().collect::<Vec<_>>(), ["node01.server1", "node02.server2"]);
    }

    #[test]
    fn stale_marker_asks_for_a_refresh() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(PERFSERVLET_PATH)
                .query_param("refreshConfig", "true");
            then.status(200).body(FIXTURE);
        });
        let dir = TempDir::new().unwrap();
        let marker = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.child("cell01.lck"))
            .unwrap();
        marker
            .set_modified(SystemTime::now() - Duration::from_secs(2 * 3600))
            .unwrap();

        let result = collector(&dir, target(&server)).run().unwrap();

        mock.assert();
        assert_eq!(result.status, Status::Ok);
    }

    #[test]
    fn basic_auth_is_sent_with_credentials() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(PERFSERVLET_PATH)
                .header("Authorization", "Basic dXNlcjpzZWNyZXQ=");
            then.status(200).body(FIXTURE);
        });
        let dir = TempDir::new().unwrap();
        let target = Target {
            username: "user".to_string(),
            password: "secret".to_string(),
            ..target(&server)
        };

        let result = collector(&dir, target).run().unwrap();

        mock.assert();
        assert_eq!(result.status, Status::Ok);
    }

    #[test]
    fn failed_cell_is_critical_and_keeps_the_store() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PERFSERVLET_PATH);
            then.status(200)
                .body(r#"<PerformanceMonitor responseStatus="failed"/>"#);
        });
        let dir = TempDir::new().unwrap();

        let result = collector(&dir, target(&server)).run().unwrap();

        assert_eq!(result.status, Status::Critical);
        assert_eq!(result.message, "Error retrieving PMI data! Check your Cell status!");
        assert!(dir.child("cell01.xml").exists());
        assert!(!dir.child("cell01.json").exists());
    }

    #[test]
    fn unexpected_status_is_unknown() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PERFSERVLET_PATH);
            then.status(200)
                .body(r#"<PerformanceMonitor responseStatus="partial"/>"#);
        });
        let dir = TempDir::new().unwrap();

        let result = collector(&dir, target(&server)).run().unwrap();

        assert_eq!(result.status, Status::Unknown);
        assert_eq!(result.message, "Unknown Perfserv Status: partial");
    }

    #[test]
    fn http_error_is_critical() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PERFSERVLET_PATH);
            then.status(500);
        });
        let dir = TempDir::new().unwrap();

        let result = collector(&dir, target(&server)).run().unwrap();

        assert_eq!(result.status, Status::Critical);
        assert_eq!(
            result.message,
            "Could not open perfservlet URL - Response Status Code 500"
        );
        assert!(!dir.child("cell01.xml").exists());
        assert!(!dir.child("cell01.json").exists());
    }

    #[test]
    fn unreachable_server_is_critical() {
        let dir = TempDir::new().unwrap();
        let target = Target {
            host: "127.0.0.1".to_string(),
            port: 1,
            protocol: Protocol::Http,
            username: String::new(),
            password: String::new(),
            ignore_cert: false,
        };

        let result = collector(&dir, target).run().unwrap();

        assert_eq!(result.status, Status::Critical);
        assert!(result.message.starts_with("Could not open perfservlet URL - "));
    }

    #[test]
    fn malformed_document_aborts_the_cycle() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(PERFSERVLET_PATH);
            then.status(200).body(
                r#"<PerformanceMonitor responseStatus="success"><Node name="n"><Server/></Node></PerformanceMonitor>"#,
            );
        });
        let dir = TempDir::new().unwrap();

        let err = collector(&dir, target(&server)).run().unwrap_err();

        assert!(format!("{err:#}").contains("Could not extract PerfServlet metrics"));
        assert!(!dir.child("cell01.json").exists());
    }

    #[test]
    fn response_status_accepts_a_doctype() {
        let result = response_status(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE PerformanceMonitor SYSTEM "/wasPerfTool/dtd/performancemonitor.dtd">
<PerformanceMonitor responseStatus="success"/>"#,
        );
        assert_eq!(result.status, Status::Ok);
    }

    #[test]
    fn response_status_of_garbage() {
        let result = response_status("this is not xml");
        assert_eq!(result.status, Status::Unknown);
        assert!(result.message.starts_with("Could not parse PerfServlet response"));
    }
}
