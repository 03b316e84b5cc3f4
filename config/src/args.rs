use clap::{
    Parser,
    Subcommand,
    ValueEnum,
};
use perfserv_monitor_metrics::Metric;
use std::path::PathBuf;
use strum::Display;

/// Monitoring plugin for WebSphere cell metrics, read through the PerfServlet application.
#[derive(Parser, Debug, Clone)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Name of the WebSphere cell.
    #[clap(short = 'C', long = "cell", value_name = "CELL")]
    pub cell: String,

    /// Directory holding the per-cell XML snapshot, store and marker files.
    #[clap(long = "runtime-dir", value_name = "DIR", global = true)]
    pub runtime_dir: Option<PathBuf>,

    /// Log at debug level.
    #[clap(long = "verbose", action, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Retrieve PerfServlet data and store it.
    Retrieve(RetrieveArgs),
    /// Check a stored metric of one server.
    Show(ShowArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RetrieveArgs {
    /// Host name or IP address of the PerfServlet server.
    #[clap(short = 'N', value_name = "HOST")]
    pub host: String,

    /// Port of the PerfServlet server.
    #[clap(short = 'P', value_name = "PORT")]
    pub port: u16,

    /// Protocol used to reach the PerfServlet.
    #[clap(short = 'H', value_enum, default_value_t = Protocol::Http)]
    pub protocol: Protocol,

    /// User authorized to access the PerfServlet.
    #[clap(short = 'u', value_name = "USER", default_value = "")]
    pub username: String,

    /// Password of the PerfServlet user.
    #[clap(short = 'p', value_name = "PASSWORD", default_value = "")]
    pub password: String,

    /// Accept invalid TLS certificates.
    #[clap(short = 'i', long = "ignore-cert", action)]
    pub ignore_cert: bool,

    /// Seconds after which the PerfServlet is asked to refresh its cache.
    #[clap(long = "refresh-interval", value_name = "SECONDS")]
    pub refresh_interval: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ShowArgs {
    /// Node name.
    #[clap(short = 'n', value_name = "NODE")]
    pub node: String,

    /// Server name.
    #[clap(short = 's', value_name = "SERVER")]
    pub server: String,

    /// Metric to check, one of WebContainer, WebContainerConcurrentHungThreadCount,
    /// ORB, Heap, DBConnectionPool, DBConnectionPoolUseTime, DBConnectionPoolWaitTime,
    /// DBConnectionPoolWaitingThreadCount, LiveSessions, SIBDestinations,
    /// SecurityAuthen or SecurityAuthor.
    #[clap(short = 'M', value_name = "METRIC")]
    pub metric: Metric,

    /// Warning threshold.
    #[clap(short = 'w', value_name = "N")]
    pub warning: Option<u64>,

    /// Critical threshold.
    #[clap(short = 'c', value_name = "N")]
    pub critical: Option<u64>,

    /// JNDI name of the connection pool.
    #[clap(short = 'j', value_name = "JNDI")]
    pub jndi: Option<String>,

    /// SIB destination name.
    #[clap(short = 'd', value_name = "DEST")]
    pub destination: Option<String>,
}

impl ShowArgs {
    /// The pool or destination name that disambiguates the metric, if any.
    pub fn target_name(&self) -> Option<&str> {
        match self.metric {
            Metric::SibDestinations => self.destination.as_deref(),
            _ => self.jndi.as_deref(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Display, ValueEnum, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(runtime_dir) = &self.runtime_dir {
                cache.insert("runtime_dir".to_string(), runtime_dir.display().to_string().into());
            }
            if let Command::Retrieve(RetrieveArgs {
                refresh_interval: Some(secs),
                ..
            }) = &self.command
            {
                cache.insert("refresh_interval_secs".to_string(), (*secs).into());
            }
            if self.verbose {
                cache.insert("verbose".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();
    let data_dir_path = crate::get_data_dir().display().to_string();

    format!(
        "{}

Authors: {author}

Config directory: {config_dir_path}
Data directory: {data_dir_path}",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Source as _;

    #[test]
    fn parses_show() {
        let args = Args::try_parse_from([
            "perfservmon",
            "-C",
            "cell01",
            "show",
            "-n",
            "node01",
            "-s",
            "server1",
            "-M",
            "DBConnectionPoolUseTime",
            "-j",
            "jdbc/OrdersDS",
            "-w",
            "3",
        ])
        .unwrap();
        assert_eq!(args.cell, "cell01");
        let Command::Show(show) = args.command else {
            panic!("expected show");
        };
        assert_eq!(show.metric, Metric::DbConnectionPoolUseTime);
        assert_eq!(show.warning, Some(3));
        assert_eq!(show.critical, None);
        assert_eq!(show.target_name(), Some("jdbc/OrdersDS"));
    }

    #[test]
    fn destination_disambiguates_sib_metric() {
        let args = Args::try_parse_from([
            "perfservmon",
            "-C",
            "c",
            "show",
            "-n",
            "n",
            "-s",
            "s",
            "-M",
            "SIBDestinations",
            "-d",
            "OrdersQueue",
            "-j",
            "ignored",
        ])
        .unwrap();
        let Command::Show(show) = args.command else {
            panic!("expected show");
        };
        assert_eq!(show.target_name(), Some("OrdersQueue"));
    }

    #[test]
    fn parses_retrieve_defaults() {
        let args = Args::try_parse_from(["perfservmon", "-C", "c", "retrieve", "-N", "was01", "-P", "9080"]).unwrap();
        let Command::Retrieve(retrieve) = &args.command else {
            panic!("expected retrieve");
        };
        assert_eq!(retrieve.protocol, Protocol::Http);
        assert_eq!(retrieve.port, 9080);
        assert!(retrieve.username.is_empty());
        assert!(!retrieve.ignore_cert);
        assert!(args.collect().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_metric() {
        let result = Args::try_parse_from([
            "perfservmon",
            "-C",
            "c",
            "show",
            "-n",
            "n",
            "-s",
            "s",
            "-M",
            "Threads",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_feed_the_config_builder() {
        let args = Args::try_parse_from([
            "perfservmon",
            "-C",
            "c",
            "--runtime-dir",
            "/var/lib/perfservmon",
            "retrieve",
            "-N",
            "was01",
            "-P",
            "9443",
            "-H",
            "https",
            "--refresh-interval",
            "60",
        ])
        .unwrap();
        let collected = args.collect().unwrap();
        assert_eq!(collected.len(), 2);
        assert!(collected.contains_key("runtime_dir"));
        assert!(collected.contains_key("refresh_interval_secs"));
    }
}
