use std::{
    fs::{
        self,
        OpenOptions,
    },
    io::{
        self,
        ErrorKind,
    },
    path::{
        Path,
        PathBuf,
    },
    time::{
        Duration,
        SystemTime,
    },
};

/// Per-cell file whose modification time records the last time the
/// PerfServlet was asked to refresh its cached configuration.
#[derive(Debug, Clone)]
pub struct FreshnessMarker {
    path: PathBuf,
}

impl FreshnessMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decides whether this request should carry the refresh flag.
    ///
    /// A missing marker is created without asking for a refresh. An existing
    /// marker older than `interval` is touched and a refresh is requested.
    pub fn refresh_due(&self, interval: Duration) -> io::Result<bool> {
        match fs::metadata(&self.path) {
            Ok(metadata) => {
                let age = metadata.modified()?.elapsed().unwrap_or_default();
                if age > interval {
                    debug!(marker = ?self.path, age_secs = age.as_secs(), "PerfServlet cache refresh due");
                    self.touch()?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.touch()?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn touch(&self) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.set_modified(SystemTime::now())
    }
}
