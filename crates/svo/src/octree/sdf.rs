use super::{Node, Octree};
use crate::bounds::Bounds;
use crate::field::ScalarField;
use crate::Corner;
use std::collections::VecDeque;
use tracing::{debug, instrument};

impl Octree {
    /// Samples `field` at voxel corners, subdividing down to `max_depth` wherever the
    /// voxel may contain the zero level set.
    ///
    /// Nodes are emitted breadth-first, and every group of siblings is contiguous.
    #[instrument(skip(field))]
    pub fn from_field<F: ScalarField + ?Sized>(field: &F, max_depth: u8) -> Octree {
        let sample = |bounds: &Bounds| bounds.corners().map(|p| field.sample(p));

        let mut nodes = vec![Node::leaf(sample(&Bounds::ROOT))];
        let mut queue: VecDeque<(usize, Bounds, u8)> = VecDeque::new();
        queue.push_back((0, Bounds::ROOT, 0));

        while let Some((index, bounds, depth)) = queue.pop_front() {
            if depth >= max_depth || !may_contain_surface(&nodes[index].values, &bounds) {
                continue;
            }
            let offset = nodes.len();
            nodes[index].offset = offset as u32;
            for corner in Corner::all() {
                let child = bounds.half(corner);
                nodes.push(Node::leaf(sample(&child)));
                queue.push_back((offset + corner as usize, child, depth + 1));
            }
        }

        debug!(nodes = nodes.len(), "built octree from field");
        Octree { nodes }
    }
}

/// A distance field cannot cross zero inside a voxel if every corner is further away than the
/// voxel's diagonal.
fn may_contain_surface(values: &[f32; 8], bounds: &Bounds) -> bool {
    let inside = values.iter().filter(|v| **v < 0.0).count();
    if inside != 0 && inside != 8 {
        return true;
    }
    let diagonal = bounds.width * 3f32.sqrt();
    values.iter().any(|v| v.abs() <= diagonal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::collect_leaves;
    use glam::Vec3;
    use std::num::NonZeroUsize;

    #[test]
    fn test_far_field_stays_a_single_leaf() {
        let octree = Octree::from_field(&|_: Vec3| 100.0f32, 5);
        assert_eq!(octree.len(), 1);
        assert!(octree.root().unwrap().is_leaf());
    }

    #[test]
    fn test_sphere_is_refined_near_surface() {
        let sphere = |p: Vec3| p.length() - 0.5;
        let octree = Octree::from_field(&sphere, 4);
        octree.validate().unwrap();
        assert_eq!(octree.depth().unwrap(), 4);

        let leaves = collect_leaves(&octree, NonZeroUsize::new(2).unwrap()).unwrap();
        let volume: f32 = leaves.iter().map(|l| l.bounds.volume()).sum();
        assert!((volume - 8.0).abs() < 1e-4);

        // Corner values are exact samples of the field.
        for leaf in leaves.iter().take(32) {
            for corner in Corner::all() {
                let p = leaf.bounds.corner(corner);
                assert_eq!(leaf.values[corner as usize], sphere(p));
            }
        }
    }

    #[test]
    fn test_children_follow_parents() {
        let octree = Octree::from_field(&|p: Vec3| p.y, 3);
        for (i, node) in octree.nodes().iter().enumerate() {
            if !node.is_leaf() {
                assert!(node.offset as usize > i);
                assert_eq!((node.offset as usize - 1) % 8, 0);
            }
        }
    }
}
