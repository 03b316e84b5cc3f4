use eyre::{
    Context as _,
    Result,
};
use perfserv_monitor_config::{
    Protocol,
    RetrieveArgs,
};
use reqwest::{
    blocking::Client,
    StatusCode,
};
use std::{
    error::Error as _,
    time::Duration,
};
use url::Url;

pub const PERFSERVLET_PATH: &str = "/wasPerfTool/servlet/perfservlet";

/// Where and how to reach the PerfServlet of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub username: String,
    pub password: String,
    pub ignore_cert: bool,
}

impl From<&RetrieveArgs> for Target {
    fn from(args: &RetrieveArgs) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            protocol: args.protocol,
            username: args.username.clone(),
            password: args.password.clone(),
            ignore_cert: args.ignore_cert,
        }
    }
}

impl Target {
    /// PerfServlet URL, with `refreshConfig=true` when the servlet should
    /// rebuild its cached configuration.
    pub fn url(&self, refresh: bool) -> Result<Url> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut url = Url::parse(&format!("{}://{host}:{}{PERFSERVLET_PATH}", self.protocol, self.port))
            .wrap_err_with(|| format!("Invalid PerfServlet address {}:{}", self.host, self.port))?;
        if refresh {
            url.query_pairs_mut().append_pair("refreshConfig", "true");
        }
        Ok(url)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        (!self.username.is_empty() && !self.password.is_empty())
            .then_some((self.username.as_str(), self.password.as_str()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Response Status Code {}", .0.as_u16())]
    Status(StatusCode),
    #[error("{}", transport_reason(.0))]
    Transport(#[source] reqwest::Error),
}

/// The innermost cause is what tells an operator why the request failed.
fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "timed out".to_string();
    }
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason = cause.to_string();
        source = cause.source();
    }
    reason
}

/// Blocking HTTP client issuing the single PerfServlet request of a run.
#[derive(Debug, Clone)]
pub struct PerfServletClient {
    client: Client,
}

impl PerfServletClient {
    pub fn new(target: &Target, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(target.ignore_cert)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub fn fetch(&self, target: &Target, url: &Url) -> Result<String, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some((username, password)) = target.credentials() {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.text().map_err(FetchError::Transport)?;
        debug!(bytes = body.len(), "PerfServlet response received");
        Ok(body)
    }
}
