mod builder;
mod node;

use std::mem;
use std::ops::Range;

use glam::Vec3;

pub use self::node::*;
use crate::{BoundingBox, BuildConfig, BvhError, Executor, Ray, Stack};

/// Bounding volume hierarchy over a set of primitives.
///
/// The builder reorders primitives, so leaves don't refer to primitives
/// directly but to *slots*; `prim_ids[slot]` tells which original primitive
/// sits in given slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    prim_ids: Vec<u32>,
}

impl Bvh {
    /// Deepest allowed node; keeps traversal within the fixed-size stack.
    pub const MAX_DEPTH: usize = Stack::CAPACITY - 1;

    /// Builds a tree over primitives described by their bounding boxes and
    /// centers.
    pub fn build<E>(
        executor: &E,
        config: &BuildConfig,
        bounds: &[BoundingBox],
        centers: &[Vec3],
    ) -> Self
    where
        E: Executor,
    {
        builder::run(executor, config, bounds, centers)
    }

    /// Assembles a tree out of raw parts; used when loading trees from the
    /// cache, so the result should be [validated](Self::validate).
    pub fn from_parts(nodes: Vec<BvhNode>, prim_ids: Vec<u32>) -> Self {
        Self { nodes, prim_ids }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn prim_ids(&self) -> &[u32] {
        &self.prim_ids
    }

    pub fn root(&self) -> Option<&BvhNode> {
        self.nodes.first()
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.prim_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prim_ids.is_empty()
    }

    /// Calls `on_leaf` for every leaf the ray might hit something in, nearer
    /// leaves first.
    ///
    /// `on_leaf` receives the ray together with the leaf's range of
    /// primitive slots; shrinking `ray.t_far` prunes the rest of the
    /// traversal.
    #[inline]
    pub fn traverse<F>(&self, ray: &mut Ray, mut on_leaf: F)
    where
        F: FnMut(&mut Ray, Range<usize>),
    {
        let Some(root) = self.root() else {
            return;
        };

        let inv_direction = 1.0 / ray.direction;

        if ray.distance_to_box(inv_direction, &root.bounds()) == f32::INFINITY {
            return;
        }

        let mut stack = Stack::default();
        let mut node_id = 0;

        loop {
            let node = &self.nodes[node_id];

            if node.is_leaf() {
                on_leaf(ray, node.primitives());
            } else {
                let mut near_id = node_id + 1;
                let mut far_id = node.right_id();

                let mut near_distance = ray.distance_to_box(
                    inv_direction,
                    &self.nodes[near_id].bounds(),
                );

                let mut far_distance = ray.distance_to_box(
                    inv_direction,
                    &self.nodes[far_id].bounds(),
                );

                if far_distance < near_distance {
                    mem::swap(&mut near_id, &mut far_id);
                    mem::swap(&mut near_distance, &mut far_distance);
                }

                // Visit the nearer child first, saving the other one for
                // later; if the nearer one is missed, so is the farther one
                if near_distance < f32::INFINITY {
                    if far_distance < f32::INFINITY {
                        stack.push(far_id as u32);
                    }

                    node_id = near_id;
                    continue;
                }
            }

            // Either a leaf got tested or both children got missed; continue
            // with the next saved node, unless the ray has been shortened so
            // much that it can't reach it anymore
            node_id = loop {
                let Some(id) = stack.pop() else {
                    return;
                };

                let id = id as usize;

                if ray.distance_to_box(inv_direction, &self.nodes[id].bounds())
                    < f32::INFINITY
                {
                    break id;
                }
            };
        }
    }

    /// Checks the structural invariants traversal relies on:
    ///
    /// - children exist and come after their parents,
    /// - no node is reachable through more than one path,
    /// - parents' bounds contain children's bounds,
    /// - leaves cover every primitive slot exactly once,
    /// - `prim_ids` is a permutation,
    /// - the tree isn't deeper than [`Self::MAX_DEPTH`].
    pub fn validate(&self) -> Result<(), BvhError> {
        if self.nodes.is_empty() {
            return if self.prim_ids.is_empty() {
                Ok(())
            } else {
                Err(BvhError::PrimitiveCoverage { slot: 0, count: 0 })
            };
        }

        let mut coverage = vec![0; self.prim_ids.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(0, 0)];

        visited[0] = true;

        while let Some((node_id, depth)) = stack.pop() {
            if depth > Self::MAX_DEPTH {
                return Err(BvhError::TooDeep {
                    max: Self::MAX_DEPTH,
                });
            }

            let node = &self.nodes[node_id];

            if node.is_leaf() {
                let range = node.primitives();

                if range.end > coverage.len() {
                    return Err(BvhError::PrimitiveRange { node: node_id });
                }

                for slot in range {
                    coverage[slot] += 1;
                }

                continue;
            }

            let bounds = node.bounds();
            let left_id = node_id + 1;
            let right_id = node.right_id();

            for child_id in [left_id, right_id] {
                if child_id >= self.nodes.len() || child_id <= node_id {
                    return Err(BvhError::DanglingChild {
                        node: node_id,
                        child: child_id,
                    });
                }

                if !bounds.contains(&self.nodes[child_id].bounds()) {
                    return Err(BvhError::BoundsNotContained {
                        node: node_id,
                        child: child_id,
                    });
                }

                // Shared children would make the walk exponential (and
                // leaves get counted more than once)
                if mem::replace(&mut visited[child_id], true) {
                    return Err(BvhError::DanglingChild {
                        node: node_id,
                        child: child_id,
                    });
                }
            }

            stack.push((right_id, depth + 1));
            stack.push((left_id, depth + 1));
        }

        if let Some((slot, count)) = coverage
            .iter()
            .copied()
            .enumerate()
            .find(|(_, count)| *count != 1)
        {
            return Err(BvhError::PrimitiveCoverage { slot, count });
        }

        let mut seen = vec![false; self.prim_ids.len()];

        for &id in &self.prim_ids {
            match seen.get_mut(id as usize) {
                Some(seen) if !*seen => *seen = true,
                _ => return Err(BvhError::PrimitiveId { id }),
            }
        }

        Ok(())
    }

    /// Returns the number of node levels (zero for an empty tree).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut depth = 0;
        let mut stack = vec![(0, 1)];

        while let Some((node_id, node_depth)) = stack.pop() {
            let Some(node) = self.nodes.get(node_id) else {
                continue;
            };

            depth = depth.max(node_depth);

            if !node.is_leaf() {
                stack.push((node_id + 1, node_depth + 1));
                stack.push((node.right_id(), node_depth + 1));
            }
        }

        depth
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::{BuildQuality, SequentialExecutor, ThreadPoolExecutor};

    fn random_boxes(rng: &mut StdRng, count: usize) -> Vec<BoundingBox> {
        (0..count)
            .map(|_| {
                let min = vec3(
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(-100.0..100.0),
                );

                let size = vec3(
                    rng.gen_range(0.0..5.0),
                    rng.gen_range(0.0..5.0),
                    rng.gen_range(0.0..5.0),
                );

                BoundingBox::new(min, min + size)
            })
            .collect()
    }

    fn build(config: &BuildConfig, boxes: &[BoundingBox]) -> Bvh {
        let centers: Vec<_> = boxes.iter().map(|bb| bb.center()).collect();

        Bvh::build(&SequentialExecutor, config, boxes, &centers)
    }

    /// Collects all leaves hit by the ray, without pruning.
    fn leaves(bvh: &Bvh, ray: Ray) -> Vec<Range<usize>> {
        let mut ray = ray;
        let mut leaves = Vec::new();

        bvh.traverse(&mut ray, |_, range| {
            leaves.push(range);
        });

        leaves
    }

    #[test]
    fn empty() {
        let target = build(&BuildConfig::default(), &[]);

        assert!(target.is_empty());
        assert_eq!(None, target.root());
        assert_eq!(0, target.depth());
        assert_eq!(Ok(()), target.validate());

        assert!(leaves(&target, Ray::new(Vec3::ZERO, Vec3::X)).is_empty());
    }

    #[test]
    fn single_primitive() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let target = build(&BuildConfig::default(), &[bb]);

        assert_eq!(Ok(()), target.validate());
        assert_eq!(1, target.nodes().len());
        assert_eq!(&[0], target.prim_ids());
        assert_eq!(bb, target.root().unwrap().bounds());
    }

    #[test]
    fn random_soups_are_valid() {
        let mut rng = StdRng::seed_from_u64(1234);

        let qualities =
            [BuildQuality::Low, BuildQuality::Medium, BuildQuality::High];

        for quality in qualities {
            for count in [2, 3, 17, 100, 1000] {
                let boxes = random_boxes(&mut rng, count);
                let config = BuildConfig::default().with_quality(quality);
                let target = build(&config, &boxes);

                assert_eq!(Ok(()), target.validate(), "{quality:?} / {count}");
                assert_eq!(count, target.len());

                // Leaves must respect the size limit
                for node in target.nodes() {
                    if node.is_leaf() {
                        assert!(
                            node.primitives().len() <= config.max_leaf_size
                        );
                    }
                }

                // Each leaf must contain the boxes of its primitives
                for node in target.nodes().iter().filter(|n| n.is_leaf()) {
                    for slot in node.primitives() {
                        let id = target.prim_ids()[slot] as usize;

                        assert!(node.bounds().contains(&boxes[id]));
                    }
                }
            }
        }
    }

    #[test]
    fn identical_primitives() {
        // All centers equal, so no plane can separate them; the builder has
        // to fall back to splitting by count
        let boxes = vec![BoundingBox::new(Vec3::ZERO, Vec3::ONE); 100];
        let target = build(&BuildConfig::default(), &boxes);

        assert_eq!(Ok(()), target.validate());
        assert!(target.depth() > 1);
    }

    #[test]
    fn axis_aligned_flat_primitives() {
        // Zero-volume boxes lying on the z = 0 plane
        let boxes: Vec<_> = (0..64)
            .map(|i| {
                let min = vec3((i % 8) as f32, (i / 8) as f32, 0.0);

                BoundingBox::new(min, min + vec3(1.0, 1.0, 0.0))
            })
            .collect();

        let target = build(&BuildConfig::default(), &boxes);

        assert_eq!(Ok(()), target.validate());

        // A ray going straight down through one cell should only reach a
        // fraction of all leaves
        let ray = Ray::new(vec3(2.5, 3.5, 10.0), vec3(0.0, 0.0, -1.0));
        let visited: usize = leaves(&target, ray).iter().map(|r| r.len()).sum();

        assert!(visited >= 1);
        assert!(visited < 64);
    }

    #[test]
    fn degenerate_points() {
        // Every primitive is a single point on a line; all boxes have zero
        // area
        let boxes: Vec<_> = (0..50)
            .map(|i| {
                let p = vec3(i as f32, 0.0, 0.0);

                BoundingBox::new(p, p)
            })
            .collect();

        let target = build(&BuildConfig::default(), &boxes);

        assert_eq!(Ok(()), target.validate());
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        let boxes = random_boxes(&mut rng, 5000);
        let centers: Vec<_> = boxes.iter().map(|bb| bb.center()).collect();
        let config = BuildConfig::default().with_parallel_threshold(64);

        let sequential =
            Bvh::build(&SequentialExecutor, &config, &boxes, &centers);

        let parallel = Bvh::build(
            &ThreadPoolExecutor::with_threads(4).unwrap(),
            &config,
            &boxes,
            &centers,
        );

        assert_eq!(Ok(()), parallel.validate());
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn traversal_prunes_by_t_far() {
        let boxes: Vec<_> = (0..16)
            .map(|i| {
                let min = vec3(0.0, 0.0, -(i as f32) * 10.0);

                BoundingBox::new(min, min + Vec3::ONE)
            })
            .collect();

        let target =
            build(&BuildConfig::default().with_max_leaf_size(1), &boxes);
        let ray = Ray::new(vec3(0.5, 0.5, 5.0), vec3(0.0, 0.0, -1.0));

        assert_eq!(16, leaves(&target, ray).len());

        // Once something has been hit in the first leaf, everything behind it
        // should get skipped
        let mut ray = ray;
        let mut visited = Vec::new();

        target.traverse(&mut ray, |ray, range| {
            visited.extend(range.map(|slot| target.prim_ids()[slot]));
            ray.t_far = ray.t_far.min(5.0);
        });

        assert_eq!(vec![0], visited);
    }

    #[test]
    fn validate_rejects_shared_subtrees_quickly() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);

        // Every internal node points at both of its successors, so there are
        // exponentially many paths through the tree
        let mut nodes: Vec<_> =
            (0..60).map(|id| BvhNode::internal(bb, id + 2)).collect();

        nodes.push(BvhNode::leaf(bb, 0, 1));
        nodes.push(BvhNode::leaf(bb, 0, 1));

        let target = Bvh::from_parts(nodes, vec![0]);

        assert!(matches!(
            target.validate(),
            Err(BvhError::DanglingChild { .. })
        ));
    }

    #[test]
    fn validate_detects_broken_trees() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let small = BoundingBox::new(Vec3::ZERO, Vec3::splat(0.5));

        // Slot 1 covered twice, slot 0 never
        let target = Bvh::from_parts(
            vec![
                BvhNode::internal(bb, 2),
                BvhNode::leaf(bb, 1, 1),
                BvhNode::leaf(bb, 1, 1),
            ],
            vec![0, 1],
        );

        assert_eq!(
            Err(BvhError::PrimitiveCoverage { slot: 0, count: 0 }),
            target.validate()
        );

        // Child escaping its parent
        let target = Bvh::from_parts(
            vec![
                BvhNode::internal(small, 2),
                BvhNode::leaf(bb, 0, 1),
                BvhNode::leaf(small, 1, 1),
            ],
            vec![0, 1],
        );

        assert_eq!(
            Err(BvhError::BoundsNotContained { node: 0, child: 1 }),
            target.validate()
        );

        // Dangling right child
        let target = Bvh::from_parts(
            vec![BvhNode::internal(bb, 5), BvhNode::leaf(bb, 0, 1)],
            vec![0],
        );

        assert_eq!(
            Err(BvhError::DanglingChild { node: 0, child: 5 }),
            target.validate()
        );

        // Two parents sharing a child
        let target = Bvh::from_parts(
            vec![
                BvhNode::internal(bb, 3),
                BvhNode::internal(bb, 3),
                BvhNode::leaf(bb, 0, 1),
                BvhNode::leaf(bb, 1, 1),
            ],
            vec![0, 1],
        );

        assert_eq!(
            Err(BvhError::DanglingChild { node: 1, child: 3 }),
            target.validate()
        );

        // Leaf out of range
        let target =
            Bvh::from_parts(vec![BvhNode::leaf(bb, 0, 3)], vec![0, 1]);

        assert_eq!(
            Err(BvhError::PrimitiveRange { node: 0 }),
            target.validate()
        );

        // Not a permutation
        let target =
            Bvh::from_parts(vec![BvhNode::leaf(bb, 0, 2)], vec![1, 1]);

        assert_eq!(Err(BvhError::PrimitiveId { id: 1 }), target.validate());
    }
}
