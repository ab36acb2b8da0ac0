//! Binned-SAH builder.
//!
//! Special thanks to:
//! - https://jacco.ompf2.com/2022/04/13/how-to-build-a-bvh-part-1-basics/,
//! - https://github.com/svenstaro/bvh.

use glam::Vec3;

use super::{Bvh, BvhNode};
use crate::{Axis, BoundingBox, BuildConfig, Executor};

/// Upper bound for [`crate::BuildQuality::bins()`].
const MAX_BINS: usize = 32;

pub fn run<E>(
    executor: &E,
    config: &BuildConfig,
    bounds: &[BoundingBox],
    centers: &[Vec3],
) -> Bvh
where
    E: Executor,
{
    debug_assert_eq!(bounds.len(), centers.len());

    let mut primitives: Vec<_> = bounds
        .iter()
        .zip(centers)
        .enumerate()
        .map(|(id, (bounds, center))| BuildPrimitive {
            id: id as u32,
            bounds: *bounds,
            center: *center,
        })
        .collect();

    if primitives.is_empty() {
        return Bvh::default();
    }

    let root = build_node(executor, config, &mut primitives, 0, 0);

    let mut nodes = Vec::with_capacity(2 * primitives.len() - 1);

    flatten(root, &mut nodes);

    let prim_ids = primitives.iter().map(|prim| prim.id).collect();

    Bvh::from_parts(nodes, prim_ids)
}

#[derive(Clone, Copy, Debug)]
struct BuildPrimitive {
    id: u32,
    bounds: BoundingBox,
    center: Vec3,
}

#[derive(Debug)]
enum BuildNode {
    Internal {
        bounds: BoundingBox,
        left: Box<BuildNode>,
        right: Box<BuildNode>,
    },

    Leaf {
        bounds: BoundingBox,
        first: u32,
        count: u32,
    },
}

/// Builds a subtree over `primitives`, which occupy slots starting at
/// `offset` in the final primitive array.
fn build_node<E>(
    executor: &E,
    config: &BuildConfig,
    primitives: &mut [BuildPrimitive],
    offset: usize,
    depth: usize,
) -> BuildNode
where
    E: Executor,
{
    let bounds: BoundingBox =
        primitives.iter().map(|prim| prim.bounds).collect();

    let leaf = BuildNode::Leaf {
        bounds,
        first: offset as u32,
        count: primitives.len() as u32,
    };

    if primitives.len() <= 1 || depth >= Bvh::MAX_DEPTH {
        return leaf;
    }

    let must_split = primitives.len() > config.max_leaf_size;

    let pivot = match find_splitting_plane(config, primitives, bounds) {
        Some(plane) if must_split || plane.cost < primitives.len() as f32 => {
            partition(primitives, plane)
        }
        _ if must_split => split_in_half(primitives),
        _ => return leaf,
    };

    let is_parallel = primitives.len() >= config.parallel_threshold;
    let (left, right) = primitives.split_at_mut(pivot);

    let mut build_left =
        move || build_node(executor, config, left, offset, depth + 1);

    let mut build_right = move || {
        build_node(executor, config, right, offset + pivot, depth + 1)
    };

    let (left, right) = if is_parallel {
        executor.join(build_left, build_right)
    } else {
        (build_left(), build_right())
    };

    BuildNode::Internal {
        bounds,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[derive(Clone, Copy, Debug)]
struct SplittingPlane {
    split_by: Axis,

    /// Primitives falling into this bin or any bin before it go to the left
    /// child.
    bin: usize,

    centroid_min: f32,
    scale: f32,
    bin_count: usize,

    /// SAH cost of splitting, relative to the cost of intersecting one
    /// primitive.
    cost: f32,
}

impl SplittingPlane {
    fn bin_of(&self, prim: &BuildPrimitive) -> usize {
        bin_of(
            prim.center[self.split_by],
            self.centroid_min,
            self.scale,
            self.bin_count,
        )
    }
}

#[derive(Clone, Copy, Default, Debug)]
struct Bin {
    bounds: BoundingBox,
    count: u32,
}

fn bin_of(
    center: f32,
    centroid_min: f32,
    scale: f32,
    bin_count: usize,
) -> usize {
    (((center - centroid_min) * scale) as usize).min(bin_count - 1)
}

fn find_splitting_plane(
    config: &BuildConfig,
    primitives: &[BuildPrimitive],
    bounds: BoundingBox,
) -> Option<SplittingPlane> {
    let parent_area = bounds.half_area();

    // Everything is collinear, so the SAH can't tell splits apart
    if parent_area <= 0.0 {
        return None;
    }

    let bin_count = config.quality.bins().clamp(2, MAX_BINS);

    let centroid_bb: BoundingBox =
        primitives.iter().map(|prim| prim.center).collect();

    let axes: &[Axis] = if config.quality.considers_all_axes() {
        &[Axis::X, Axis::Y, Axis::Z]
    } else {
        match Axis::largest(centroid_bb.extent()) {
            Axis::X => &[Axis::X],
            Axis::Y => &[Axis::Y],
            Axis::Z => &[Axis::Z],
        }
    };

    let mut best: Option<SplittingPlane> = None;

    for &split_by in axes {
        let extent = centroid_bb.extent()[split_by];

        if extent <= 0.0 {
            continue;
        }

        let centroid_min = centroid_bb.min()[split_by];
        let scale = (bin_count as f32) / extent;
        let mut bins = [Bin::default(); MAX_BINS];

        for prim in primitives {
            let bin_idx =
                bin_of(prim.center[split_by], centroid_min, scale, bin_count);

            bins[bin_idx].bounds += prim.bounds;
            bins[bin_idx].count += 1;
        }

        // ---

        let mut right_areas = [0.0; MAX_BINS];
        let mut right_counts = [0; MAX_BINS];
        let mut right_bb = BoundingBox::default();
        let mut right_count = 0;

        for i in (1..bin_count).rev() {
            right_bb += bins[i].bounds;
            right_count += bins[i].count;

            right_areas[i - 1] = right_bb.half_area();
            right_counts[i - 1] = right_count;
        }

        // ---

        let mut left_bb = BoundingBox::default();
        let mut left_count = 0;

        for i in 0..(bin_count - 1) {
            left_bb += bins[i].bounds;
            left_count += bins[i].count;

            if left_count == 0 || right_counts[i] == 0 {
                continue;
            }

            let cost = config.traversal_cost
                + ((left_count as f32) * left_bb.half_area()
                    + (right_counts[i] as f32) * right_areas[i])
                    / parent_area;

            let is_current_bin_better =
                best.map_or(true, |best| cost < best.cost);

            if is_current_bin_better {
                best = Some(SplittingPlane {
                    split_by,
                    bin: i,
                    centroid_min,
                    scale,
                    bin_count,
                    cost,
                });
            }
        }
    }

    best
}

/// Moves primitives belonging to the left side of `plane` before the rest
/// and returns the number of such primitives.
fn partition(
    primitives: &mut [BuildPrimitive],
    plane: SplittingPlane,
) -> usize {
    let mut left = 0;
    let mut right = primitives.len();

    while left < right {
        if plane.bin_of(&primitives[left]) <= plane.bin {
            left += 1;
        } else {
            right -= 1;
            primitives.swap(left, right);
        }
    }

    // Can't happen for planes with both sides counted as non-empty, but
    // an empty side would make the recursion spin in place
    if left == 0 || left == primitives.len() {
        split_in_half(primitives)
    } else {
        left
    }
}

/// Splits primitives at the median center along the widest axis.
fn split_in_half(primitives: &mut [BuildPrimitive]) -> usize {
    let centroid_bb: BoundingBox =
        primitives.iter().map(|prim| prim.center).collect();

    let split_by = Axis::largest(centroid_bb.extent());
    let mid = primitives.len() / 2;

    primitives.select_nth_unstable_by(mid, |a, b| {
        a.center[split_by]
            .total_cmp(&b.center[split_by])
            .then(a.id.cmp(&b.id))
    });

    mid
}

/// Writes `node` in depth-first order and returns its index.
fn flatten(node: BuildNode, nodes: &mut Vec<BvhNode>) -> u32 {
    let id = nodes.len();

    match node {
        BuildNode::Internal {
            bounds,
            left,
            right,
        } => {
            nodes.push(Default::default());

            let _left_id = flatten(*left, nodes);
            let right_id = flatten(*right, nodes);

            nodes[id] = BvhNode::internal(bounds, right_id);
        }

        BuildNode::Leaf {
            bounds,
            first,
            count,
        } => {
            nodes.push(BvhNode::leaf(bounds, first, count));
        }
    }

    id as u32
}
