use glam::{Vec2, Vec3};

use crate::{BoundingBox, Ray};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    positions: [Vec3; 3],
}

impl Triangle {
    pub fn new(positions: [Vec3; 3]) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> [Vec3; 3] {
        self.positions
    }

    pub fn center(&self) -> Vec3 {
        self.positions.iter().copied().sum::<Vec3>() / 3.0
    }

    pub fn bounds(&self) -> BoundingBox {
        self.positions.iter().copied().collect()
    }
}

/// Triangle re-expressed as a vertex, two edges and an (unnormalized) face
/// normal, which is all the intersection test needs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PrecomputedTriangle {
    p0: Vec3,
    e1: Vec3,
    e2: Vec3,
    n: Vec3,
}

impl PrecomputedTriangle {
    pub fn normal(&self) -> Vec3 {
        self.n
    }

    /// Returns `(t, u, v)` of the intersection, if the ray hits this
    /// triangle within `ray.t_near ..= ray.t_far`.
    ///
    /// Both sides of the triangle are hit; `u` weights the second vertex and
    /// `v` the third one.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        let c = self.p0 - ray.origin;
        let r = ray.direction.cross(c);
        let det = self.n.dot(ray.direction);

        if det == 0.0 {
            return None;
        }

        let inv_det = 1.0 / det;
        let u = r.dot(self.e2) * inv_det;
        let v = r.dot(self.e1) * inv_det;
        let w = 1.0 - u - v;

        if (u < 0.0) | (v < 0.0) | (w < 0.0) {
            return None;
        }

        let t = self.n.dot(c) * inv_det;

        if (t >= ray.t_near) & (t <= ray.t_far) {
            Some((t, u, v))
        } else {
            None
        }
    }

    /// Returns the point at given barycentric coordinates.
    pub fn point_at(&self, uv: Vec2) -> Vec3 {
        let p1 = self.p0 - self.e1;
        let p2 = self.p0 + self.e2;

        (1.0 - uv.x - uv.y) * self.p0 + uv.x * p1 + uv.y * p2
    }
}

impl From<Triangle> for PrecomputedTriangle {
    fn from(triangle: Triangle) -> Self {
        let [p0, p1, p2] = triangle.positions();
        let e1 = p0 - p1;
        let e2 = p2 - p0;

        Self {
            p0,
            e1,
            e2,
            n: e1.cross(e2),
        }
    }
}
