//! Benchmark datasets: in-memory values, the built-in catalog and the
//! on-disk prepared cache.
//!
//! ## Cache layout
//!
//! ```text
//! <root>/
//!   siftsmall/                 raw texmex files (placed by the user)
//!   glove-100-angular/         raw files written by an external converter
//!   sift10k/                   prepared by `DatasetCache::prepare`
//!     base.fvecs
//!     queries.fvecs
//!     groundtruth.ivecs
//!     dataset.json
//! ```
//!
//! Candidates receive `<root>` as `VECBENCH_DATA_DIR` and read the prepared
//! directory for the dataset name they are given.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec;
use crate::error::{BenchError, Result};
use crate::ground_truth::{self, Metric};
use crate::vectors::{NeighborList, VectorSet};

/// Neighbors kept per query when preparing a dataset.
pub const DEFAULT_GROUND_TRUTH_DEPTH: usize = 100;

pub const BASE_FILE: &str = "base.fvecs";
pub const QUERIES_FILE: &str = "queries.fvecs";
pub const GROUND_TRUTH_FILE: &str = "groundtruth.ivecs";
pub const METADATA_FILE: &str = "dataset.json";

/// Read access to a dataset's vectors and exact neighbors.
pub trait DatasetHandle {
    fn name(&self) -> &str;
    fn metric(&self) -> Metric;
    fn base(&self) -> &VectorSet;
    fn queries(&self) -> &VectorSet;
    fn ground_truth(&self) -> &[Vec<u32>];

    fn dim(&self) -> usize {
        self.base().dim()
    }
}

/// A validated dataset held in memory.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    metric: Metric,
    base: VectorSet,
    queries: VectorSet,
    ground_truth: NeighborList,
}

impl Dataset {
    /// Assemble a dataset, checking that dimensions agree, that there is one
    /// ground-truth row per query and that every index points into `base`.
    pub fn new(
        name: impl Into<String>,
        metric: Metric,
        base: VectorSet,
        queries: VectorSet,
        ground_truth: NeighborList,
    ) -> Result<Self> {
        let name = name.into();
        if !queries.is_empty() && base.dim() != queries.dim() {
            return Err(BenchError::format(format!(
                "{name}: base dimension {} != query dimension {}",
                base.dim(),
                queries.dim()
            )));
        }
        if ground_truth.len() != queries.len() {
            return Err(BenchError::format(format!(
                "{name}: {} ground-truth rows for {} queries",
                ground_truth.len(),
                queries.len()
            )));
        }
        let n_base = base.len();
        if let Some((q, idx)) = ground_truth
            .iter()
            .enumerate()
            .find_map(|(q, row)| row.iter().find(|&&i| i as usize >= n_base).map(|&i| (q, i)))
        {
            return Err(BenchError::format(format!(
                "{name}: query {q} references base index {idx}, base has {n_base} vectors"
            )));
        }

        Ok(Self {
            name,
            metric,
            base,
            queries,
            ground_truth,
        })
    }

    /// First `n_base` base vectors and first `n_queries` queries, with
    /// ground truth of depth `k`.
    ///
    /// Truncating the base invalidates stored indices (they point into the
    /// full set), so ground truth is recomputed. Truncating only the queries
    /// keeps the matching rows. Stored rows shallower than `k` are also
    /// recomputed.
    pub fn subset(&self, n_base: usize, n_queries: usize, k: usize) -> Result<Dataset> {
        let base = self.base.truncated(n_base);
        let queries = self.queries.truncated(n_queries);
        let depth = k.min(base.len());

        let base_truncated = base.len() < self.base.len();
        let too_shallow = self.ground_truth[..queries.len()]
            .iter()
            .any(|row| row.len() < depth);

        let ground_truth = if base_truncated || too_shallow {
            info!(
                dataset = %self.name,
                n_base = base.len(),
                n_queries = queries.len(),
                k,
                "Recomputing ground truth for subset"
            );
            ground_truth::compute_parallel(&base, &queries, k, self.metric)?
        } else {
            self.ground_truth[..queries.len()]
                .iter()
                .map(|row| row[..depth.min(row.len())].to_vec())
                .collect()
        };

        Dataset::new(self.name.clone(), self.metric, base, queries, ground_truth)
    }

    /// Depth of the stored ground truth (0 when there are no queries).
    pub fn ground_truth_depth(&self) -> usize {
        self.ground_truth.first().map(Vec::len).unwrap_or(0)
    }
}

impl DatasetHandle for Dataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn base(&self) -> &VectorSet {
        &self.base
    }

    fn queries(&self) -> &VectorSet {
        &self.queries
    }

    fn ground_truth(&self) -> &[Vec<u32>] {
        &self.ground_truth
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Where and how a known dataset's raw files are found.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub metric: Metric,
    pub dim: usize,
    /// Directory under the cache root holding the raw files.
    pub source_dir: &'static str,
    pub base_file: &'static str,
    pub query_file: &'static str,
    /// Upstream neighbors file; ground truth is computed when absent.
    pub ground_truth_file: Option<&'static str>,
    /// Truncate the raw base to this many vectors.
    pub n_base: Option<usize>,
    /// Truncate the raw queries to this many vectors.
    pub n_queries: Option<usize>,
    /// Shown when raw files are missing.
    pub source_url: &'static str,
    pub description: &'static str,
}

impl DatasetSpec {
    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(self.source_dir)
    }
}

/// The set of datasets known by name.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    specs: Vec<DatasetSpec>,
}

const GLOVE_URL: &str = "http://ann-benchmarks.com/glove-100-angular.hdf5";
const DBPEDIA_URL: &str = "https://huggingface.co/datasets/KShivendu/dbpedia-entities-openai-1M";

impl DatasetCatalog {
    /// Built-in datasets.
    ///
    /// The texmex SIFT sets ship as fvecs/ivecs. GloVe (HDF5) and DBpedia
    /// (parquet) must first be converted to `base.fvecs` / `queries.fvecs`
    /// by an external tool.
    pub fn builtin() -> Self {
        let specs = vec![
            DatasetSpec {
                name: "sift10k",
                metric: Metric::L2,
                dim: 128,
                source_dir: "siftsmall",
                base_file: "siftsmall_base.fvecs",
                query_file: "siftsmall_query.fvecs",
                ground_truth_file: Some("siftsmall_groundtruth.ivecs"),
                n_base: None,
                n_queries: None,
                source_url: "ftp://ftp.irisa.fr/local/texmex/corpus/siftsmall.tar.gz",
                description: "SIFT 10K, 128D, 100 queries",
            },
            DatasetSpec {
                name: "sift1m",
                metric: Metric::L2,
                dim: 128,
                source_dir: "sift",
                base_file: "sift_base.fvecs",
                query_file: "sift_query.fvecs",
                ground_truth_file: Some("sift_groundtruth.ivecs"),
                n_base: None,
                n_queries: None,
                source_url: "ftp://ftp.irisa.fr/local/texmex/corpus/sift.tar.gz",
                description: "SIFT 1M, 128D, 10K queries",
            },
            DatasetSpec {
                name: "glove10k",
                metric: Metric::Angular,
                dim: 100,
                source_dir: "glove-100-angular",
                base_file: BASE_FILE,
                query_file: QUERIES_FILE,
                ground_truth_file: Some(GROUND_TRUTH_FILE),
                n_base: Some(10_000),
                n_queries: Some(100),
                source_url: GLOVE_URL,
                description: "GloVe 100D subset, 10K vectors, 100 queries",
            },
            DatasetSpec {
                name: "glove100",
                metric: Metric::Angular,
                dim: 100,
                source_dir: "glove-100-angular",
                base_file: BASE_FILE,
                query_file: QUERIES_FILE,
                ground_truth_file: Some(GROUND_TRUTH_FILE),
                n_base: None,
                n_queries: None,
                source_url: GLOVE_URL,
                description: "GloVe 100D, ~1.18M vectors, 10K queries",
            },
            DatasetSpec {
                name: "dbpedia-openai-100k",
                metric: Metric::Angular,
                dim: 1536,
                source_dir: "dbpedia-entities-openai-1M",
                base_file: BASE_FILE,
                query_file: QUERIES_FILE,
                ground_truth_file: None,
                n_base: Some(100_000),
                n_queries: Some(1_000),
                source_url: DBPEDIA_URL,
                description: "DBpedia OpenAI ada-002 subset, 100K x 1536D",
            },
            DatasetSpec {
                name: "dbpedia-openai-1m",
                metric: Metric::Angular,
                dim: 1536,
                source_dir: "dbpedia-entities-openai-1M",
                base_file: BASE_FILE,
                query_file: QUERIES_FILE,
                ground_truth_file: None,
                n_base: None,
                n_queries: Some(1_000),
                source_url: DBPEDIA_URL,
                description: "DBpedia OpenAI ada-002, 1M x 1536D",
            },
        ];
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Result<&DatasetSpec> {
        self.specs.iter().find(|s| s.name == name).ok_or_else(|| {
            BenchError::config(format!(
                "unknown dataset '{name}' (known: {})",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetSpec> {
        self.specs.iter()
    }
}

// ============================================================================
// Prepared cache
// ============================================================================

/// Contents of `dataset.json` in a prepared directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub name: String,
    pub metric: Metric,
    pub dim: usize,
    pub n_base: usize,
    pub n_queries: usize,
    pub k: usize,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl DatasetMetadata {
    fn describe(dataset: &Dataset) -> Self {
        Self {
            name: dataset.name.clone(),
            metric: dataset.metric,
            dim: dataset.dim(),
            n_base: dataset.base.len(),
            n_queries: dataset.queries.len(),
            k: dataset.ground_truth_depth(),
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Explicit cache directory holding raw and prepared datasets.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    root: PathBuf,
}

impl DatasetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the prepared files for `name`.
    pub fn prepared_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Metadata of a prepared dataset, if one exists.
    pub fn metadata(&self, name: &str) -> Option<DatasetMetadata> {
        DatasetMetadata::load(&self.prepared_dir(name)).ok()
    }

    /// Return the prepared dataset, building it from raw files on first use
    /// or when the cached ground truth is shallower than `k`.
    pub fn prepare(&self, spec: &DatasetSpec, k: usize) -> Result<Dataset> {
        if k == 0 {
            return Err(BenchError::config("ground-truth depth k must be at least 1"));
        }
        if let Some(meta) = self.metadata(spec.name) {
            if meta.k >= k.min(meta.n_base) {
                debug!(dataset = spec.name, k = meta.k, "Using prepared dataset");
                return self.open(spec.name);
            }
            info!(
                dataset = spec.name,
                cached_k = meta.k,
                k,
                "Prepared ground truth too shallow, rebuilding"
            );
        }

        let dataset = self.load_raw(spec, k)?;
        self.store(&dataset)?;
        Ok(dataset)
    }

    /// Read an already prepared dataset.
    pub fn open(&self, name: &str) -> Result<Dataset> {
        let dir = self.prepared_dir(name);
        let meta = DatasetMetadata::load(&dir).map_err(|e| {
            BenchError::config(format!(
                "dataset '{name}' is not prepared in {}: {e}",
                self.root.display()
            ))
        })?;
        let base = VectorSet::from_rows(codec::read_fvecs(&dir.join(BASE_FILE))?)?;
        let queries = VectorSet::from_rows(codec::read_fvecs(&dir.join(QUERIES_FILE))?)?;
        let ground_truth =
            codec::to_neighbor_list(codec::read_ivecs(&dir.join(GROUND_TRUTH_FILE))?, base.len())?;
        Dataset::new(meta.name, meta.metric, base, queries, ground_truth)
    }

    fn load_raw(&self, spec: &DatasetSpec, k: usize) -> Result<Dataset> {
        let src = spec.source_path(&self.root);
        let base_path = src.join(spec.base_file);
        let query_path = src.join(spec.query_file);
        if !base_path.exists() || !query_path.exists() {
            return Err(BenchError::config(format!(
                "raw files for '{}' not found. Expected {} and {} (source: {})",
                spec.name,
                base_path.display(),
                query_path.display(),
                spec.source_url
            )));
        }

        let n_base = spec.n_base.unwrap_or(usize::MAX);
        let n_queries = spec.n_queries.unwrap_or(usize::MAX);

        info!(dataset = spec.name, path = %base_path.display(), "Loading base vectors");
        let base = VectorSet::from_rows(codec::read_fvecs_limited(&base_path, n_base)?)?;
        let queries = VectorSet::from_rows(codec::read_fvecs_limited(&query_path, n_queries)?)?;
        if base.dim() != spec.dim {
            return Err(BenchError::format(format!(
                "{}: expected dimension {}, found {}",
                spec.name,
                spec.dim,
                base.dim()
            )));
        }
        info!(
            dataset = spec.name,
            n_base = base.len(),
            n_queries = queries.len(),
            dim = base.dim(),
            "Loaded raw vectors"
        );

        let gt_path = spec.ground_truth_file.map(|f| src.join(f));
        let ground_truth = match gt_path {
            // Upstream neighbors index the full raw base; they are only usable
            // when the base was read completely.
            Some(path) if path.exists() && spec.n_base.is_none() => {
                let rows = codec::read_ivecs_limited(&path, queries.len())?;
                let neighbors = codec::to_neighbor_list(rows, base.len())?;
                let dataset =
                    Dataset::new(spec.name, spec.metric, base, queries, neighbors)?;
                return dataset.subset(usize::MAX, usize::MAX, k);
            }
            _ => ground_truth::compute_parallel(&base, &queries, k, spec.metric)?,
        };
        Dataset::new(spec.name, spec.metric, base, queries, ground_truth)
    }

    /// Write a dataset's prepared directory atomically: files go to a temp
    /// dir inside the cache root, which is then renamed into place.
    pub fn store(&self, dataset: &Dataset) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let tmp = tempfile::Builder::new()
            .prefix(".prepare-")
            .tempdir_in(&self.root)?;

        codec::write_fvecs(&tmp.path().join(BASE_FILE), &dataset.base)?;
        codec::write_fvecs(&tmp.path().join(QUERIES_FILE), &dataset.queries)?;
        codec::write_ivecs(&tmp.path().join(GROUND_TRUTH_FILE), &dataset.ground_truth)?;
        let meta = DatasetMetadata::describe(dataset);
        fs::write(
            tmp.path().join(METADATA_FILE),
            serde_json::to_string_pretty(&meta)?,
        )?;

        let target = self.prepared_dir(&dataset.name);
        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(tmp.path(), &target)?;
        info!(
            dataset = %dataset.name,
            path = %target.display(),
            k = meta.k,
            "Prepared dataset"
        );
        Ok(target)
    }
}
