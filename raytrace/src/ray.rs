use glam::Vec3;

use crate::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_near: f32,

    /// Upper bound of the tested distance; shrinks to the nearest hit found
    /// so far while the ray is being traced.
    pub t_far: f32,

    pub mask: u32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            t_near: 0.0,
            t_far: f32::INFINITY,
            mask: u32::MAX,
        }
    }

    pub fn with_t_near(mut self, t_near: f32) -> Self {
        self.t_near = t_near;
        self
    }

    pub fn with_t_far(mut self, t_far: f32) -> Self {
        self.t_far = t_far;
        self
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Returns the entry distance into given box, or `f32::INFINITY` if the
    /// ray misses it within `t_near ..= t_far`.
    ///
    /// `inv_direction` must be `1.0 / self.direction`; it's passed in so that
    /// traversal computes it just once per ray.
    pub(crate) fn distance_to_box(
        &self,
        inv_direction: Vec3,
        bounds: &BoundingBox,
    ) -> f32 {
        let hit_min = (bounds.min() - self.origin) * inv_direction;
        let hit_max = (bounds.max() - self.origin) * inv_direction;

        // NaN (`0.0 * inf`) means the ray runs parallel to this axis, right
        // within one of the slab's planes, so the axis doesn't constrain it
        let parallel = hit_min.is_nan_mask() | hit_max.is_nan_mask();

        let entry = Vec3::select(
            parallel,
            Vec3::splat(f32::NEG_INFINITY),
            hit_min.min(hit_max),
        );

        let exit = Vec3::select(
            parallel,
            Vec3::splat(f32::INFINITY),
            hit_min.max(hit_max),
        );

        let tmin = entry.max_element().max(self.t_near);
        let tmax = exit.min_element().min(self.t_far);

        if tmin <= tmax {
            tmin
        } else {
            f32::INFINITY
        }
    }
}
