use std::sync::Arc;

use rayon::ThreadPoolBuildError;

use crate::{
    BvhCache, DeviceConfig, Geometry, Instance, Scene, ThreadPoolExecutor,
};

/// Entry point: owns configuration, worker threads and the BVH cache, and
/// creates everything else.
#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
    executor: ThreadPoolExecutor,
    cache: Option<BvhCache>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Self, ThreadPoolBuildError> {
        log::info!("Initializing");

        let executor = match config.threads {
            Some(threads) => ThreadPoolExecutor::with_threads(threads)?,
            None => ThreadPoolExecutor::default(),
        };

        let cache = BvhCache::from_config(&config.cache);

        log::debug!(
            "Device ready; threads={}, cache={:?}",
            executor.threads(),
            cache.as_ref().map(|cache| cache.dir())
        );

        Ok(Self {
            config,
            executor,
            cache,
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn executor(&self) -> &ThreadPoolExecutor {
        &self.executor
    }

    pub fn cache(&self) -> Option<&BvhCache> {
        self.cache.as_ref()
    }

    pub fn create_geometry(&self, label: impl Into<String>) -> Geometry {
        Geometry::new(label)
    }

    pub fn create_instance(
        &self,
        label: impl Into<String>,
        geometry: Arc<Geometry>,
    ) -> Instance {
        Instance::new(label, geometry)
    }

    pub fn create_scene(&self, label: impl Into<String>) -> Scene {
        Scene::new(label)
    }

    pub fn commit_geometry(&self, geometry: &mut Geometry) {
        geometry.commit(
            &self.executor,
            self.cache.as_ref(),
            &self.config.build,
        );
    }
}

impl Default for Device {
    /// Device using the process-wide thread pool and the default cache
    /// directory.
    fn default() -> Self {
        let config = DeviceConfig::default();

        Self {
            executor: ThreadPoolExecutor::default(),
            cache: BvhCache::from_config(&config.cache),
            config,
        }
    }
}
