use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::BoundingBox;

/// Node of a flattened BVH.
///
/// Nodes are laid out in depth-first order: an internal node's left child
/// immediately follows it, while the index of its right child is stored
/// explicitly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    min: [f32; 3],

    /// Leaf: index of the first primitive slot; internal: index of the right
    /// child.
    index: u32,

    max: [f32; 3],

    /// Leaf: number of primitives (always non-zero); internal: zero.
    count: u32,
}

impl BvhNode {
    pub fn leaf(bounds: BoundingBox, first: u32, count: u32) -> Self {
        debug_assert!(count > 0);

        Self {
            min: bounds.min().to_array(),
            index: first,
            max: bounds.max().to_array(),
            count,
        }
    }

    pub fn internal(bounds: BoundingBox, right_id: u32) -> Self {
        Self {
            min: bounds.min().to_array(),
            index: right_id,
            max: bounds.max().to_array(),
            count: 0,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(Vec3::from(self.min), Vec3::from(self.max))
    }

    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    /// Range of primitive slots covered by this leaf; empty for internal
    /// nodes.
    pub fn primitives(&self) -> Range<usize> {
        if self.is_leaf() {
            let start = self.index as usize;

            start..(start + self.count as usize)
        } else {
            0..0
        }
    }

    pub fn right_id(&self) -> usize {
        self.index as usize
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use glam::vec3;

    use super::*;

    #[test]
    fn layout() {
        assert_eq!(32, mem::size_of::<BvhNode>());
    }

    #[test]
    fn leaf() {
        let bounds = BoundingBox::new(Vec3::ZERO, vec3(1.0, 2.0, 3.0));
        let target = BvhNode::leaf(bounds, 5, 3);

        assert!(target.is_leaf());
        assert_eq!(5..8, target.primitives());
        assert_eq!(bounds, target.bounds());
    }

    #[test]
    fn internal() {
        let bounds = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let target = BvhNode::internal(bounds, 7);

        assert!(!target.is_leaf());
        assert_eq!(0..0, target.primitives());
        assert_eq!(7, target.right_id());
    }
}
