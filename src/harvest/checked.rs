//! Memo of URLs a source has already inspected and rejected.
//!
//! Keyword-filtered sources that fetch every article page would otherwise
//! re-download the same non-matching pages on every run. Rejected URLs are
//! appended here, one per line, as soon as they are rejected.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct CheckedUrls {
    path: PathBuf,
    urls: HashSet<String>,
}

impl CheckedUrls {
    /// Load the memo at `path`. A missing file is an empty memo.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let urls = match fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        info!(path = %path.display(), count = urls.len(), "Loaded checked URLs");
        Ok(Self { path, urls })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Remember `url` and append it to the file. Known URLs are not written twice.
    pub fn record(&mut self, url: &str) -> io::Result<()> {
        if !self.urls.insert(url.to_string()) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{url}")?;
        debug!(%url, "Recorded checked URL");
        Ok(())
    }
}
