use eyre::{
    Context as _,
    Result,
};
use perfserv_monitor_collector::{
    Collector,
    Target,
};
use perfserv_monitor_config::{
    Args,
    Command,
    Config,
    ShowArgs,
};
use perfserv_monitor_metrics::{
    check,
    CheckResult,
    Metric,
    Query,
    Store,
};

/// One plugin invocation: a single retrieval or a single check.
#[derive(Debug)]
pub struct App {
    args: Args,
    config: Config,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args.clone()).wrap_err("Failed to load configuration")?;
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<CheckResult> {
        let cell = &self.args.cell;
        match &self.args.command {
            Command::Retrieve(retrieve) => {
                info!(%cell, host = %retrieve.host, port = retrieve.port, "Retrieving PerfServlet data");
                Collector::new(&self.config, cell, Target::from(retrieve))?.run()
            }
            Command::Show(show) => Ok(self.show(show)),
        }
    }

    fn show(&self, show: &ShowArgs) -> CheckResult {
        let files = self.config.cell_files(&self.args.cell);
        let store = match Store::open_read_only(&files.store) {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "Cannot read server store");
                return CheckResult::unknown(err.to_string());
            }
        };

        let thresholds = show.metric.thresholds(show.warning, show.critical);
        if show.metric != Metric::LiveSessions && !thresholds.is_ordered() {
            return CheckResult::unknown(format!(
                "Warning threshold {} must not exceed critical threshold {}",
                thresholds.warning, thresholds.critical
            ));
        }
        let mut query = Query::new(show.metric).with_thresholds(thresholds);
        if let Some(name) = show.target_name() {
            query = query.with_name(name);
        }
        let result = check(&store, &show.node, &show.server, &query);
        debug!(metric = %show.metric, status = %result.status, "Check evaluated");
        result
    }
}
