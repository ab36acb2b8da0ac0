use std::ops::Index;

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Returns the axis along which `v` has the largest component.
    pub fn largest(v: Vec3) -> Self {
        if v.x >= v.y && v.x >= v.z {
            Self::X
        } else if v.y >= v.z {
            Self::Y
        } else {
            Self::Z
        }
    }
}

impl Index<Axis> for Vec3 {
    type Output = f32;

    fn index(&self, index: Axis) -> &Self::Output {
        match index {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}
