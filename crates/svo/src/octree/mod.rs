use crate::bounds::Bounds;
use crate::error::{Error, Result};
use crate::field::{trilinear, ScalarField};
use crate::Corner;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

mod io;
mod leaves;
mod sdf;

pub(crate) use io::read_exact_or_truncated;
pub(crate) use leaves::{gather_leaves, worker_pool};
pub use leaves::{collect_leaves, LeafVoxel};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Node {
    /// Signed distance at each corner of the node, indexed by [`Corner`].
    pub values: [f32; 8],
    /// Index of the first of 8 contiguous children. 0 marks a leaf.
    pub offset: u32,
}

impl Node {
    pub fn leaf(values: [f32; 8]) -> Self {
        Node { values, offset: 0 }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.offset == 0
    }

    #[inline]
    pub fn child_index(&self, corner: Corner) -> usize {
        self.offset as usize + corner as usize
    }
}

/// A sparse octree stored as a flat node array. Node 0 is the root and covers [`Bounds::ROOT`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Octree {
    nodes: Vec<Node>,
}

impl Octree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Octree { nodes }
    }

    /// An octree made of a single leaf root.
    pub fn from_root(values: [f32; 8]) -> Self {
        Octree {
            nodes: vec![Node::leaf(values)],
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Result<&Node> {
        self.nodes.first().ok_or(Error::EmptyOctree)
    }

    /// Returns the node `index`, after checking its children are inside the node array.
    #[inline]
    pub(crate) fn checked_node(&self, index: usize) -> Result<&Node> {
        let node = self.nodes.get(index).ok_or_else(|| match index {
            0 => Error::EmptyOctree,
            _ => Error::MissingNode {
                node: index,
                len: self.nodes.len(),
            },
        })?;
        if !node.is_leaf() && node.offset as usize + 7 >= self.nodes.len() {
            return Err(Error::ChildOutOfBounds {
                node: index,
                offset: node.offset,
                len: self.nodes.len(),
            });
        }
        Ok(node)
    }

    /// Depth-first walk over every node reachable from the root, calling `visit` with the
    /// depth of each. Fails on the first broken link or on a node reached twice.
    fn walk<F: FnMut(u32)>(&self, mut visit: F) -> Result<()> {
        self.root()?;
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![(0usize, 0u32)];
        while let Some((index, depth)) = stack.pop() {
            let node = self.checked_node(index)?;
            if std::mem::replace(&mut visited[index], true) {
                return Err(Error::Revisited { node: index });
            }
            visit(depth);
            if !node.is_leaf() {
                stack.extend(Corner::all().map(|c| (node.child_index(c), depth + 1)));
            }
        }
        Ok(())
    }

    /// Checks that the child links from the root are in bounds and form a tree.
    ///
    /// Children may be stored anywhere in the array, before or after their parent.
    pub fn validate(&self) -> Result<()> {
        self.walk(|_| {})
    }

    /// Value of the field at `point`, which must lie within [`Bounds::ROOT`].
    pub fn sample(&self, point: Vec3) -> Result<f32> {
        let mut index = 0;
        let mut node = self.checked_node(index)?;
        let mut bounds = Bounds::ROOT;
        let mut steps = 0;
        while !node.is_leaf() {
            // A path longer than the node array has to pass some node twice.
            steps += 1;
            if steps > self.nodes.len() {
                return Err(Error::Revisited { node: index });
            }
            let corner = bounds.octant_of(point);
            bounds = bounds.half(corner);
            index = node.child_index(corner);
            node = self.checked_node(index)?;
        }
        Ok(trilinear(&node.values, bounds.local(point)))
    }

    /// Validates the tree and returns an infallible sampler over it.
    pub fn field(&self) -> Result<OctreeField<'_>> {
        self.validate()?;
        Ok(OctreeField { nodes: &self.nodes })
    }

    /// Number of levels below the root on the deepest path.
    pub fn depth(&self) -> Result<u32> {
        let mut max_depth = 0;
        self.walk(|depth| max_depth = max_depth.max(depth))?;
        Ok(max_depth)
    }
}

/// Sampler over an octree whose child links have been validated to form a tree.
#[derive(Clone, Copy)]
pub struct OctreeField<'a> {
    nodes: &'a [Node],
}

impl<'a> ScalarField for OctreeField<'a> {
    /// Points outside [`Bounds::ROOT`] are clamped onto it.
    fn sample(&self, point: Vec3) -> f32 {
        let point = point.clamp(Bounds::ROOT.min, Bounds::ROOT.max());
        let mut node = &self.nodes[0];
        let mut bounds = Bounds::ROOT;
        while !node.is_leaf() {
            let corner = bounds.octant_of(point);
            bounds = bounds.half(corner);
            node = &self.nodes[node.child_index(corner)];
        }
        trilinear(&node.values, bounds.local(point))
    }
}
