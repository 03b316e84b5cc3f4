use std::path::{
    Path,
    PathBuf,
};

/// The three files a cell keeps in the runtime directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFiles {
    pub cell: String,
    /// Raw PerfServlet response of the last successful retrieval.
    pub xml: PathBuf,
    /// Server record store.
    pub store: PathBuf,
    /// Freshness marker, its mtime is the last PerfServlet cache refresh.
    pub marker: PathBuf,
}

impl CellFiles {
    pub fn new(runtime_dir: impl AsRef<Path>, cell: &str) -> Self {
        let runtime_dir = runtime_dir.as_ref();
        Self {
            cell: cell.to_string(),
            xml: runtime_dir.join(format!("{cell}.xml")),
            store: runtime_dir.join(format!("{cell}.json")),
            marker: runtime_dir.join(format!("{cell}.lck")),
        }
    }
}
