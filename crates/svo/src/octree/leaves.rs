use super::Octree;
use crate::bounds::Bounds;
use crate::error::{Error, Result};
use crate::field::{trilinear, ScalarField};
use crate::Corner;
use glam::Vec3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use tracing::{debug, instrument};

/// A terminal voxel of the octree with its own copy of the corner values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafVoxel {
    pub bounds: Bounds,
    pub values: [f32; 8],
}

impl LeafVoxel {
    pub fn new(min_corner: Vec3, voxel_size: f32, values: [f32; 8]) -> Self {
        LeafVoxel {
            bounds: Bounds::new(min_corner, voxel_size),
            values,
        }
    }

    #[inline]
    pub fn min_corner(&self) -> Vec3 {
        self.bounds.min
    }

    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.bounds.width
    }
}

/// Trilinear interpolation of the voxel's own corners, extrapolated outside of it.
impl ScalarField for LeafVoxel {
    fn sample(&self, point: Vec3) -> f32 {
        trilinear(&self.values, self.bounds.local(point))
    }
}

/// A node waiting to be classified, with the geometry known from traversal.
#[derive(Clone, Copy)]
struct NodeContext {
    index: usize,
    bounds: Bounds,
}

impl NodeContext {
    fn child(&self, octree_offset: u32, dir: Corner) -> NodeContext {
        NodeContext {
            index: octree_offset as usize + dir as usize,
            bounds: self.bounds.half(dir),
        }
    }
}

/// Per-worker output for one level. Owned by a single worker until the level is merged.
#[derive(Default)]
struct LevelBucket {
    leaves: Vec<LeafVoxel>,
    next: Vec<NodeContext>,
}

/// Builds a pool of `workers` threads dedicated to one collection or extraction.
pub(crate) fn worker_pool(workers: NonZeroUsize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(workers.get())
        .thread_name(|i| format!("mesher-{}", i))
        .build()?)
}

/// Gathers every leaf voxel of the octree on a pool of `workers` threads.
///
/// Leaves come out level by level, in traversal order within each level.
pub fn collect_leaves(octree: &Octree, workers: NonZeroUsize) -> Result<Vec<LeafVoxel>> {
    worker_pool(workers)?.install(|| gather_leaves(octree))
}

/// Level-synchronous leaf collection on the current rayon pool, with a full barrier between
/// levels.
#[instrument(skip_all, fields(nodes = octree.len()))]
pub(crate) fn gather_leaves(octree: &Octree) -> Result<Vec<LeafVoxel>> {
    octree.root()?;

    let mut leaves = Vec::new();
    let mut frontier = vec![NodeContext {
        index: 0,
        bounds: Bounds::ROOT,
    }];
    let mut level = 0u32;
    let mut reached = 0usize;

    while !frontier.is_empty() {
        // A tree reaches each stored node at most once.
        reached += frontier.len();
        if reached > octree.len() {
            return Err(Error::NotATree {
                reached,
                len: octree.len(),
            });
        }

        let buckets = frontier
            .par_iter()
            .try_fold(LevelBucket::default, |mut bucket, context| {
                let node = octree.checked_node(context.index)?;
                if node.is_leaf() {
                    bucket.leaves.push(LeafVoxel {
                        bounds: context.bounds,
                        values: node.values,
                    });
                } else {
                    bucket
                        .next
                        .extend(Corner::all().map(|dir| context.child(node.offset, dir)));
                }
                Ok::<_, Error>(bucket)
            })
            .collect::<Result<Vec<LevelBucket>>>()?;

        let found_before = leaves.len();
        let mut next = Vec::with_capacity(buckets.iter().map(|b| b.next.len()).sum());
        for bucket in buckets {
            leaves.extend(bucket.leaves);
            next.extend(bucket.next);
        }
        debug!(
            level,
            frontier = frontier.len(),
            leaves = leaves.len() - found_before,
            "collected octree level"
        );

        frontier = next;
        level += 1;
    }

    Ok(leaves)
}
