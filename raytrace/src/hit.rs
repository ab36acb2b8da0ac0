use glam::{Vec2, Vec3};

use crate::{Geometry, Instance, Ray};

/// Nearest intersection found along a ray.
#[derive(Clone, Copy, Debug)]
pub struct Hit<'a> {
    /// Distance along the ray; same as the ray's `t_far` after the query.
    pub t_far: f32,

    /// Index of the triangle, as laid out in the geometry's index buffer.
    pub triangle_id: u32,

    /// Barycentric coordinates of the hit.
    ///
    /// Triangles are stored with reversed winding, so `x` weights the
    /// triangle's second vertex and `y` its first one (as laid out in the
    /// index buffer).
    pub uv: Vec2,

    /// Face normal, normalized and then transformed by the instance's
    /// transform (if any).
    ///
    /// The result is not normalized again, so transforms that scale yield
    /// normals of non-unit length.
    pub normal: Vec3,

    pub instance: Option<&'a Instance>,
    pub geometry: &'a Geometry,
}

impl Hit<'_> {
    pub fn position(&self, ray: &Ray) -> Vec3 {
        ray.at(self.t_far)
    }
}

/// Something rays can be traced against.
pub trait Intersect {
    /// Returns the nearest hit within `ray.t_near ..= ray.t_far`; on hit,
    /// `ray.t_far` gets shortened to the hit's distance.
    fn intersect<'a>(&'a self, ray: &mut Ray) -> Option<Hit<'a>>;
}
