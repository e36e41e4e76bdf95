//! Regional pricing client.
//!
//! Construction is cheap. The catalog is read and indexed on first use, exactly
//! once, even when many threads ask at the same time; everyone else waits on
//! the condition variable and then shares the same immutable indices.

use observability::PricingMetrics;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use strum::Display;
use tracing::{error, info, warn};

use crate::catalog::RawCatalog;
use crate::error::{PricingError, PricingResult};
use crate::index::{IndexStats, PricingIndices, build_indices};
use crate::models::{
    Currency, DynamoDbRates, EksSupportTier, LambdaArchitecture, LambdaRates, LoadBalancerClass,
    LoadBalancerRates,
};

/// Where the raw catalog documents come from
#[cfg_attr(test, mockall::automock)]
pub trait CatalogSource: Send + Sync {
    /// Human-readable origin, used in logs and errors
    fn describe(&self) -> String;

    /// Read every document; called at most once per client
    fn load(&self) -> PricingResult<Vec<Vec<u8>>>;
}

/// Catalog documents on disk
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    paths: Vec<PathBuf>,
}

impl FileCatalogSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl CatalogSource for FileCatalogSource {
    fn describe(&self) -> String {
        self.paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn load(&self) -> PricingResult<Vec<Vec<u8>>> {
        self.paths
            .iter()
            .map(|path| {
                fs::read(path).map_err(|e| {
                    PricingError::Initialization(format!(
                        "cannot read catalog {}: {e}",
                        path.display()
                    ))
                })
            })
            .collect()
    }
}

/// Catalog documents already in memory
#[derive(Debug, Clone, Default)]
pub struct BytesCatalogSource {
    documents: Vec<Vec<u8>>,
}

impl BytesCatalogSource {
    pub fn new(documents: Vec<Vec<u8>>) -> Self {
        Self { documents }
    }

    pub fn single(document: impl Into<Vec<u8>>) -> Self {
        Self {
            documents: vec![document.into()],
        }
    }
}

impl CatalogSource for BytesCatalogSource {
    fn describe(&self) -> String {
        format!("{} in-memory document(s)", self.documents.len())
    }

    fn load(&self) -> PricingResult<Vec<Vec<u8>>> {
        Ok(self.documents.clone())
    }
}

/// Read-only price lookups for one region
///
/// `None` means the catalog has no such rate; it is never an error.
#[cfg_attr(test, mockall::automock)]
pub trait PriceLookup: Send + Sync {
    fn region(&self) -> String;

    /// Build the indices if needed and report whether pricing data is usable
    fn ensure_ready(&self) -> PricingResult<()>;

    fn ec2_on_demand_hourly(&self, instance_type: &str, platform: &str, tenancy: &str) -> Option<f64>;

    fn ebs_monthly_per_gb(&self, volume_class: &str) -> Option<f64>;

    fn rds_instance_hourly(&self, class: &str, engine: &str, deployment: &str) -> Option<f64>;

    fn rds_storage_monthly_per_gb(&self, engine: &str, storage_class: &str) -> Option<f64>;

    fn s3_monthly_per_gb(&self, storage_class: &str) -> Option<f64>;

    fn eks_cluster_hourly(&self, tier: EksSupportTier) -> Option<f64>;

    fn lambda_rates(&self, architecture: LambdaArchitecture) -> Option<LambdaRates>;

    fn dynamodb_rates(&self) -> DynamoDbRates;

    fn load_balancer_rates(&self, class: LoadBalancerClass) -> Option<LoadBalancerRates>;
}

enum BuildState {
    Unbuilt,
    Building,
    Ready(Arc<PricingIndices>),
    Failed(String),
}

/// Externally visible build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildPhase {
    Unbuilt,
    Building,
    Ready,
    Failed,
}

/// Snapshot of the client state
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub region: String,
    pub currency: Currency,
    pub source: String,
    pub phase: BuildPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_entries: usize,
    pub services: BTreeMap<String, IndexStats>,
}

/// Pricing client for exactly one region
pub struct PricingClient {
    region: String,
    source: Box<dyn CatalogSource>,
    state: Mutex<BuildState>,
    built: Condvar,
}

/// Marks the build failed if the building thread unwinds.
struct BuildGuard<'a> {
    client: &'a PricingClient,
    armed: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            error!(region = %self.client.region, "Pricing index build panicked");
            let mut state = self.client.lock_state();
            *state = BuildState::Failed("index build panicked".to_string());
            self.client.built.notify_all();
        }
    }
}

impl PricingClient {
    pub fn new(region: impl Into<String>, source: impl CatalogSource + 'static) -> Self {
        Self {
            region: region.into(),
            source: Box::new(source),
            state: Mutex::new(BuildState::Unbuilt),
            built: Condvar::new(),
        }
    }

    /// Client over catalog files on disk
    pub fn from_paths(region: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self::new(region, FileCatalogSource::new(paths))
    }

    /// Client over one in-memory catalog document
    pub fn from_bytes(region: impl Into<String>, document: impl Into<Vec<u8>>) -> Self {
        Self::new(region, BytesCatalogSource::single(document))
    }

    pub fn currency(&self) -> Currency {
        Currency::Usd
    }

    /// Build now instead of on first lookup.
    pub fn warm(&self) -> PricingResult<()> {
        self.indices().map(|_| ())
    }

    pub fn status(&self) -> ClientStatus {
        let state = self.lock_state();
        let (phase, error, indices) = match &*state {
            BuildState::Unbuilt => (BuildPhase::Unbuilt, None, None),
            BuildState::Building => (BuildPhase::Building, None, None),
            BuildState::Ready(indices) => (BuildPhase::Ready, None, Some(Arc::clone(indices))),
            BuildState::Failed(reason) => (BuildPhase::Failed, Some(reason.clone()), None),
        };
        drop(state);

        ClientStatus {
            region: self.region.clone(),
            currency: Currency::Usd,
            source: self.source.describe(),
            phase,
            error,
            total_entries: indices.as_ref().map_or(0, |i| i.total_entries()),
            services: indices.map(|i| i.stats().clone()).unwrap_or_default(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BuildState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared indices, building them on the first call.
    pub fn indices(&self) -> PricingResult<Arc<PricingIndices>> {
        let mut state = self.lock_state();
        loop {
            let in_progress = match &*state {
                BuildState::Ready(indices) => return Ok(Arc::clone(indices)),
                BuildState::Failed(reason) => {
                    return Err(PricingError::Initialization(reason.clone()));
                }
                BuildState::Building => true,
                BuildState::Unbuilt => false,
            };
            if !in_progress {
                break;
            }
            state = self
                .built
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = BuildState::Building;
        drop(state);

        let mut guard = BuildGuard {
            client: self,
            armed: true,
        };
        let started = Instant::now();
        let outcome = self.build();
        let elapsed = started.elapsed().as_secs_f64();

        let mut state = self.lock_state();
        let result = match outcome {
            Ok(indices) => {
                let indices = Arc::new(indices);
                info!(
                    region = %self.region,
                    entries = indices.total_entries(),
                    duration_secs = elapsed,
                    "Pricing indices ready"
                );
                PricingMetrics::record_index_build(&self.region, "ready", elapsed);
                *state = BuildState::Ready(Arc::clone(&indices));
                Ok(indices)
            }
            Err(e) => {
                error!(region = %self.region, error = %e, "Pricing index build failed");
                PricingMetrics::record_index_build(&self.region, "failed", elapsed);
                let reason = match &e {
                    PricingError::Initialization(reason) => reason.clone(),
                    other => other.to_string(),
                };
                *state = BuildState::Failed(reason.clone());
                Err(PricingError::Initialization(reason))
            }
        };
        guard.armed = false;
        self.built.notify_all();
        result
    }

    fn build(&self) -> PricingResult<PricingIndices> {
        info!(region = %self.region, source = %self.source.describe(), "Loading pricing catalog");
        let documents = self.source.load()?;
        if documents.is_empty() {
            return Err(PricingError::Initialization(
                "no catalog documents supplied".to_string(),
            ));
        }

        let mut catalogs = Vec::with_capacity(documents.len());
        let mut last_error = None;
        for document in &documents {
            match RawCatalog::from_slice(document) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    warn!(error = %e, "Skipping unusable catalog document");
                    last_error = Some(e);
                }
            }
        }
        if catalogs.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                PricingError::Initialization("no usable catalog documents".to_string())
            }));
        }

        let indices = build_indices(&catalogs);
        for (service, stats) in indices.stats() {
            PricingMetrics::record_index_service(service, stats.kept, stats.filtered, stats.malformed);
        }
        if indices.is_empty() {
            warn!(region = %self.region, "Catalog produced no priced entries");
        }
        Ok(indices)
    }

    fn lookup<T>(&self, f: impl FnOnce(&PricingIndices) -> Option<T>) -> Option<T> {
        self.indices().ok().and_then(|indices| f(&indices))
    }
}

impl PriceLookup for PricingClient {
    fn region(&self) -> String {
        self.region.clone()
    }

    fn ensure_ready(&self) -> PricingResult<()> {
        self.warm()
    }

    fn ec2_on_demand_hourly(&self, instance_type: &str, platform: &str, tenancy: &str) -> Option<f64> {
        self.lookup(|i| i.ec2_on_demand_hourly(instance_type, platform, tenancy))
    }

    fn ebs_monthly_per_gb(&self, volume_class: &str) -> Option<f64> {
        self.lookup(|i| i.ebs_monthly_per_gb(volume_class))
    }

    fn rds_instance_hourly(&self, class: &str, engine: &str, deployment: &str) -> Option<f64> {
        self.lookup(|i| i.rds_instance_hourly(class, engine, deployment))
    }

    fn rds_storage_monthly_per_gb(&self, engine: &str, storage_class: &str) -> Option<f64> {
        self.lookup(|i| i.rds_storage_monthly_per_gb(engine, storage_class))
    }

    fn s3_monthly_per_gb(&self, storage_class: &str) -> Option<f64> {
        self.lookup(|i| i.s3_monthly_per_gb(storage_class))
    }

    fn eks_cluster_hourly(&self, tier: EksSupportTier) -> Option<f64> {
        self.lookup(|i| i.eks_cluster_hourly(tier))
    }

    fn lambda_rates(&self, architecture: LambdaArchitecture) -> Option<LambdaRates> {
        self.lookup(|i| i.lambda_rates(architecture))
    }

    fn dynamodb_rates(&self) -> DynamoDbRates {
        self.lookup(|i| Some(i.dynamodb_rates())).unwrap_or_default()
    }

    fn load_balancer_rates(&self, class: LoadBalancerClass) -> Option<LoadBalancerRates> {
        self.lookup(|i| i.load_balancer_rates(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use test_utils::catalog::us_east_1_catalog;

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        document: Vec<u8>,
    }

    impl CatalogSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn load(&self) -> PricingResult<Vec<Vec<u8>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(vec![self.document.clone()])
        }
    }

    #[test]
    fn test_lazy_build_runs_once_under_concurrency() {
        let loads = Arc::new(AtomicUsize::new(0));
        let client = PricingClient::new(
            "us-east-1",
            CountingSource {
                loads: Arc::clone(&loads),
                document: us_east_1_catalog().to_bytes(),
            },
        );
        assert_eq!(client.status().phase, BuildPhase::Unbuilt);

        let rates: Vec<Option<f64>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| client.ec2_on_demand_hourly("t3.micro", "Linux", "Shared")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(rates.iter().all(|rate| *rate == Some(0.0104)));
        assert_eq!(client.status().phase, BuildPhase::Ready);
    }

    #[test]
    fn test_repeated_lookups_are_identical() {
        let client = PricingClient::from_bytes("us-east-1", us_east_1_catalog().to_bytes());
        let first = client.ebs_monthly_per_gb("gp3");
        let second = client.ebs_monthly_per_gb("gp3");
        assert_eq!(first, Some(0.08));
        assert_eq!(first, second);
        assert_eq!(client.region(), "us-east-1");
        assert_eq!(client.currency(), Currency::Usd);
    }

    #[test]
    fn test_failed_build_is_sticky_and_not_retried() {
        let mut source = MockCatalogSource::new();
        source.expect_describe().returning(|| "mock".to_string());
        source
            .expect_load()
            .times(1)
            .returning(|| Ok(vec![b"{not json".to_vec()]));

        let client = PricingClient::new("us-east-1", source);

        assert!(matches!(client.ensure_ready(), Err(PricingError::Initialization(_))));
        assert!(matches!(client.ensure_ready(), Err(PricingError::Initialization(_))));
        assert_eq!(client.ec2_on_demand_hourly("t3.micro", "Linux", "Shared"), None);
        assert_eq!(client.dynamodb_rates(), DynamoDbRates::default());

        let status = client.status();
        assert_eq!(status.phase, BuildPhase::Failed);
        assert!(status.error.unwrap().contains("not valid price list JSON"));
    }

    #[test]
    fn test_unreadable_file_fails_initialization() {
        let client = PricingClient::from_paths(
            "us-east-1",
            vec![PathBuf::from("/nonexistent/pricing/catalog.json")],
        );
        let err = client.warm().unwrap_err();
        assert!(err.to_string().contains("cannot read catalog"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_panicking_source_moves_to_failed() {
        struct PanickingSource;
        impl CatalogSource for PanickingSource {
            fn describe(&self) -> String {
                "panicking".to_string()
            }
            fn load(&self) -> PricingResult<Vec<Vec<u8>>> {
                panic!("source exploded")
            }
        }

        let client = PricingClient::new("us-east-1", PanickingSource);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| client.warm()));
        assert!(outcome.is_err());

        assert_eq!(client.status().phase, BuildPhase::Failed);
        assert!(client.warm().is_err());
    }

    #[test]
    fn test_one_bad_document_does_not_sink_the_rest() {
        let client = PricingClient::new(
            "us-east-1",
            BytesCatalogSource::new(vec![b"garbage".to_vec(), us_east_1_catalog().to_bytes()]),
        );
        assert!(client.warm().is_ok());
        assert_eq!(client.s3_monthly_per_gb("Standard"), Some(0.023));
        assert!(client.status().services.contains_key("AmazonEC2"));
    }
}
