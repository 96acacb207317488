//! JSON persistence of aggregated suite results.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::aggregate::AggregatedResult;
use crate::error::Result;
use crate::result::BenchmarkResult;

/// Report files, one `<dataset>.json` array per dataset.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, dataset: &str) -> PathBuf {
        self.dir.join(format!("{dataset}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the suite's results for `dataset`, replacing any previous file.
    pub fn save(&self, dataset: &str, results: &[AggregatedResult]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(dataset);
        let records: Vec<BenchmarkResult> = results.iter().map(AggregatedResult::to_result).collect();
        fs::write(&path, serde_json::to_string_pretty(&records)?)?;
        info!(path = %path.display(), count = records.len(), "Saved results");
        Ok(path)
    }

    pub fn load(&self, dataset: &str) -> Result<Vec<BenchmarkResult>> {
        let content = fs::read_to_string(self.path(dataset))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use serde_json::json;
    use tempfile::TempDir;

    fn result(library: &str, qps: f64) -> BenchmarkResult {
        BenchmarkResult::from_value(json!({"library": library, "search_qps": qps})).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path().join("results"));

        let single = aggregate(&[result("hnswlib", 10.0)]).unwrap();
        let multi = aggregate(&[result("lucene", 10.0), result("lucene", 30.0)]).unwrap();
        let path = store.save("sift10k", &[single, multi]).unwrap();
        assert_eq!(path, dir.path().join("results/sift10k.json"));

        let loaded = store.load("sift10k").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].library(), "hnswlib");
        assert!(loaded[0].get("n_runs").is_none());
        assert_eq!(loaded[1].metric("search_qps"), Some(20.0));
        assert_eq!(loaded[1].metric("n_runs"), Some(2.0));
    }

    #[test]
    fn test_load_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        assert!(store.load("nope").is_err());
    }
}
