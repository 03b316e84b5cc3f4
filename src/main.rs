use clap::{
    error::ErrorKind,
    Parser,
};
use perfserv_monitor::{
    init_errors,
    logging,
    App,
    Args,
};
use perfserv_monitor_metrics::{
    CheckResult,
    Status,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(Status::Unknown.code()),
            };
        }
    };

    let result = run(args).unwrap_or_else(|err| {
        tracing::error!("{err:?}");
        CheckResult::unknown(format!("{err:#}"))
    });
    println!("{result}");
    ExitCode::from(result.status.code())
}

fn run(args: Args) -> eyre::Result<CheckResult> {
    init_errors()?;
    let app = App::new(args)?;
    logging::log_init(app.config())?;
    app.run()
}
