use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use derivative::Derivative;
use glam::{vec2, Mat4};

use crate::{
    BufferInfo, BuildConfig, Bvh, BvhCache, CacheKey, CommitError,
    ContentHash, Executor, Hit, Instance, Intersect, PrecomputedTriangle, Ray,
    TriangleSoup,
};

/// Arbitrary payload attached to geometries and instances, handed back
/// through [`Hit`].
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Triangle mesh prepared for ray queries.
///
/// Geometry starts empty: buffers get registered through
/// [`Self::set_buffer()`], and then [`Self::commit()`] reads them, builds
/// (or loads from cache) the tree and precomputes the triangles. Until the
/// first successful commit, every query misses.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Geometry {
    label: String,
    buffers: Vec<BufferInfo>,
    enabled: bool,
    mask: u32,
    vertex_attribute_count: usize,
    #[derivative(Debug = "ignore")]
    user_data: Option<UserData>,
    #[derivative(Debug = "ignore")]
    bvh: Option<Bvh>,
    #[derivative(Debug = "ignore")]
    triangles: Vec<PrecomputedTriangle>,
    hash: Option<ContentHash>,
}

impl Geometry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            buffers: Default::default(),
            enabled: true,
            mask: u32::MAX,
            vertex_attribute_count: 0,
            user_data: None,
            bvh: None,
            triangles: Default::default(),
            hash: None,
        }
    }

    pub fn debug_label(&self) -> &str {
        &self.label
    }

    /// Registers a buffer; takes effect on the next [`Self::commit()`].
    ///
    /// If more than one buffer of the same type gets registered, the most
    /// recent one is used.
    pub fn set_buffer(&mut self, buffer: BufferInfo) {
        self.buffers.push(buffer);
    }

    pub fn buffers(&self) -> &[BufferInfo] {
        &self.buffers
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Stores how many vertex attributes the caller's vertex layout has;
    /// it's a hint only, it doesn't affect queries.
    pub fn set_vertex_attribute_count(&mut self, count: usize) {
        self.vertex_attribute_count = count;
    }

    pub fn vertex_attribute_count(&self) -> usize {
        self.vertex_attribute_count
    }

    pub fn set_user_data(&mut self, user_data: Option<UserData>) {
        self.user_data = user_data;
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Content hash of the triangles seen by the last successful commit.
    pub fn content_hash(&self) -> Option<ContentHash> {
        self.hash
    }

    pub fn bvh(&self) -> Option<&Bvh> {
        self.bvh.as_ref()
    }

    /// Number of triangles ready for queries.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_committed(&self) -> bool {
        self.bvh.is_some()
    }

    /// Reads the registered buffers and prepares the geometry for queries.
    ///
    /// If the buffers aren't there yet (or have formats we don't support),
    /// this is a no-op; other failures leave the geometry without any
    /// triangles. Problems are logged, see [`Self::try_commit()`] for a
    /// variant that returns them instead.
    pub fn commit<E>(
        &mut self,
        executor: &E,
        cache: Option<&BvhCache>,
        config: &BuildConfig,
    ) where
        E: Executor,
    {
        match self.try_commit(executor, cache, config) {
            Ok(()) => (),

            Err(err) if err.is_not_ready() => {
                log::debug!("Geometry `{}` not committed: {err}", self.label);
            }

            Err(err @ CommitError::Ingest(_)) => {
                log::warn!("Geometry `{}` not committed: {err}", self.label);
            }

            Err(err @ CommitError::Build(_)) => {
                log::error!("Geometry `{}` not committed: {err}", self.label);
            }
        }
    }

    pub fn try_commit<E>(
        &mut self,
        executor: &E,
        cache: Option<&BvhCache>,
        config: &BuildConfig,
    ) -> Result<(), CommitError>
    where
        E: Executor,
    {
        let tt = Instant::now();

        let soup = match TriangleSoup::ingest(&self.buffers) {
            Ok(soup) => soup,

            Err(err) => {
                if !err.is_not_ready() {
                    self.reset();
                }

                return Err(err.into());
            }
        };

        log::trace!(
            "Geometry `{}`: triangles={}, hash={}",
            self.label,
            soup.len(),
            soup.hash
        );

        let key = CacheKey::new(soup.hash);

        let bvh = match cache.and_then(|cache| self.load(cache, key, &soup)) {
            Some(bvh) => bvh,

            None => {
                let bvh =
                    Bvh::build(executor, config, &soup.bounds, &soup.centers);

                if let Err(err) = bvh.validate() {
                    self.reset();

                    return Err(err.into());
                }

                if let Some(cache) = cache {
                    if let Err(err) = cache.save(key, &bvh) {
                        log::error!(
                            "Couldn't save BVH of geometry `{}` into `{}`: \
                             {err}",
                            self.label,
                            cache.path(key).display()
                        );
                    }
                }

                bvh
            }
        };

        let mut triangles =
            vec![PrecomputedTriangle::default(); bvh.prim_ids().len()];

        executor.for_each(&mut triangles, |offset, chunk| {
            let prim_ids = &bvh.prim_ids()[offset..];

            for (triangle, &prim_id) in chunk.iter_mut().zip(prim_ids) {
                *triangle = soup.triangles[prim_id as usize].into();
            }
        });

        log::info!(
            "Geometry `{}` committed; triangles={}, nodes={}, took={:?}",
            self.label,
            triangles.len(),
            bvh.nodes().len(),
            tt.elapsed()
        );

        self.bvh = Some(bvh);
        self.triangles = triangles;
        self.hash = Some(soup.hash);

        Ok(())
    }

    fn load(
        &self,
        cache: &BvhCache,
        key: CacheKey,
        soup: &TriangleSoup,
    ) -> Option<Bvh> {
        match cache.load(key, soup.len()) {
            Ok(Some(bvh)) => {
                log::debug!(
                    "Geometry `{}`: BVH loaded from `{}`",
                    self.label,
                    cache.path(key).display()
                );

                Some(bvh)
            }

            Ok(None) => None,

            Err(err) => {
                log::warn!(
                    "Couldn't load BVH of geometry `{}` from `{}`, rebuilding: \
                     {err}",
                    self.label,
                    cache.path(key).display()
                );

                None
            }
        }
    }

    fn reset(&mut self) {
        self.bvh = None;
        self.triangles = Default::default();
        self.hash = None;
    }

    /// Finds the nearest triangle hit by the ray within
    /// `ray.t_near ..= ray.t_far`, shortening `ray.t_far` on hit.
    ///
    /// The ray is expected to be already expressed in this geometry's
    /// space; `instance`'s transform is only used to bring the hit's normal
    /// into world space.
    pub fn intersect<'a>(
        &'a self,
        ray: &mut Ray,
        instance: Option<&'a Instance>,
    ) -> Option<Hit<'a>> {
        if !self.enabled || ray.mask & self.mask == 0 {
            return None;
        }

        let bvh = self.bvh.as_ref()?;
        let mut nearest = None;

        bvh.traverse(ray, |ray, slots| {
            for slot in slots {
                if let Some((t, u, v)) = self.triangles[slot].intersect(ray) {
                    ray.t_far = t;
                    nearest = Some((slot, vec2(u, v)));
                }
            }
        });

        let (slot, uv) = nearest?;

        let transform =
            instance.map_or(Mat4::IDENTITY, |instance| instance.transform());

        let normal = transform
            .transform_vector3(self.triangles[slot].normal().normalize());

        Some(Hit {
            t_far: ray.t_far,
            triangle_id: bvh.prim_ids()[slot],
            uv,
            normal,
            instance,
            geometry: self,
        })
    }
}

impl Intersect for Geometry {
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<Hit<'a>> {
        Geometry::intersect(self, ray, None)
    }
}
