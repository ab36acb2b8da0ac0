use std::path::PathBuf;

/// Trade-off between how long it takes to build a tree and how fast it is to
/// trace rays through it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildQuality {
    /// Few bins, only the widest axis gets considered for splitting.
    Low,

    Medium,

    /// Most bins, all axes considered.
    #[default]
    High,
}

impl BuildQuality {
    /// Number of bins used when looking for the optimal splitting plane.
    pub fn bins(self) -> usize {
        match self {
            BuildQuality::Low => 8,
            BuildQuality::Medium => 16,
            BuildQuality::High => 32,
        }
    }

    pub fn considers_all_axes(self) -> bool {
        !matches!(self, BuildQuality::Low)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildConfig {
    pub quality: BuildQuality,

    /// Nodes with more primitives than this always get split, even if the
    /// SAH says it's not worth it.
    pub max_leaf_size: usize,

    /// Cost of visiting a node, relative to the cost of intersecting a single
    /// triangle.
    pub traversal_cost: f32,

    /// Nodes with at least this many primitives have their children built
    /// in parallel.
    pub parallel_threshold: usize,
}

impl BuildConfig {
    pub fn with_quality(mut self, quality: BuildQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_leaf_size(mut self, max_leaf_size: usize) -> Self {
        self.max_leaf_size = max_leaf_size.max(1);
        self
    }

    pub fn with_traversal_cost(mut self, traversal_cost: f32) -> Self {
        self.traversal_cost = traversal_cost;
        self
    }

    pub fn with_parallel_threshold(
        mut self,
        parallel_threshold: usize,
    ) -> Self {
        self.parallel_threshold = parallel_threshold;
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            quality: BuildQuality::High,
            max_leaf_size: 8,
            traversal_cost: 1.0,
            parallel_threshold: 4096,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding one file per cached tree.
    pub dir: PathBuf,
    pub enabled: bool,
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache/bvh"),
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceConfig {
    pub build: BuildConfig,
    pub cache: CacheConfig,

    /// Size of a dedicated thread pool; when missing, the process-wide pool
    /// is shared.
    pub threads: Option<usize>,
}

impl DeviceConfig {
    pub fn with_build(mut self, build: BuildConfig) -> Self {
        self.build = build;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}
