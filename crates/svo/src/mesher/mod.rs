mod marching_cube;
mod obj;
mod tables;

pub use marching_cube::{cube_index, interpolate, polygonise, ISO_EPSILON};
pub use obj::{read_obj, write_obj};

use crate::error::Result;
use crate::octree::{gather_leaves, worker_pool, Octree};
use fxhash::FxHashMap;
use glam::Vec3;
use rayon::prelude::*;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use tracing::{info, instrument};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Vertex {
            position,
            normal,
            color: Vec3::ONE,
        }
    }
}

/// How emitted vertices are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Assembly {
    /// Three new vertices per triangle. Triangulation runs on every worker, each filling
    /// its own fragment.
    #[default]
    Fast,
    /// Equal vertices share an index. The lookup is single writer, so triangulation runs
    /// on one thread into a single mesh.
    Deduplicated,
}

/// Exact bit pattern of a vertex, with `-0.0` folded into `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VertexKey([u32; 9]);

impl VertexKey {
    fn new(vertex: &Vertex) -> Self {
        let mut bits = [0; 9];
        let fields = [vertex.position, vertex.normal, vertex.color];
        for (chunk, v) in bits.chunks_exact_mut(3).zip(fields) {
            for (bit, f) in chunk.iter_mut().zip(v.to_array()) {
                *bit = (f + 0.0).to_bits();
            }
        }
        VertexKey(bits)
    }
}

/// Maps float bits onto unsigned integers with the same ordering as the floats.
#[inline]
fn ordered_bits(bits: u32) -> u32 {
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Spreads the low 21 bits of `v` so that there are two zero bits between each of them.
#[inline]
fn spread_bits(v: u32) -> u64 {
    let mut x = (v & 0x1f_ffff) as u64;
    x = (x | x << 32) & 0x001f_0000_0000_ffff;
    x = (x | x << 16) & 0x001f_0000_ff00_00ff;
    x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
    x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
    x = (x | x << 2) & 0x1249_2492_4924_9249;
    x
}

impl Hash for VertexKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let [x, y, z] = [self.0[0], self.0[1], self.0[2]].map(ordered_bits);
        // Interleave the high bits of the position, so nearby vertices land close together.
        let morton = spread_bits(x >> 11) | spread_bits(y >> 11) << 1 | spread_bits(z >> 11) << 2;
        state.write_u64(morton);
        state.write_u32(x ^ y.rotate_left(11) ^ z.rotate_left(22));
    }
}

/// An indexed triangle list.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    lookup: Option<FxHashMap<VertexKey, u32>>,
}

impl Mesh {
    pub fn new(assembly: Assembly) -> Self {
        Mesh {
            vertices: Vec::new(),
            indices: Vec::new(),
            lookup: match assembly {
                Assembly::Fast => None,
                Assembly::Deduplicated => Some(FxHashMap::default()),
            },
        }
    }

    /// Builds a fast mesh out of existing buffers. Every index must refer to a vertex.
    pub fn from_parts(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.iter().all(|i| (*i as usize) < vertices.len()));
        Mesh {
            vertices,
            indices,
            lookup: None,
        }
    }

    pub fn assembly(&self) -> Assembly {
        if self.lookup.is_some() {
            Assembly::Deduplicated
        } else {
            Assembly::Fast
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Appends `vertex` to the index buffer and returns its index.
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        let vertices = &mut self.vertices;
        let mut push = || {
            let index = vertices.len() as u32;
            vertices.push(vertex);
            index
        };
        let index = match &mut self.lookup {
            None => push(),
            Some(lookup) => *lookup.entry(VertexKey::new(&vertex)).or_insert_with(push),
        };
        self.indices.push(index);
        index
    }

    pub fn add_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex) {
        self.add_vertex(a);
        self.add_vertex(b);
        self.add_vertex(c);
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        if let Some(lookup) = &mut self.lookup {
            lookup.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Min and max vertex positions, `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(min, max), v| {
                    (min.min(v.position), max.max(v.position))
                }),
        )
    }

    /// Joins fragments into one fast mesh, offsetting each fragment's indices by the number
    /// of vertices before it.
    pub fn concat<I: IntoIterator<Item = Mesh>>(fragments: I) -> Mesh {
        let mut mesh = Mesh::new(Assembly::Fast);
        for fragment in fragments {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend(fragment.vertices);
            mesh.indices.extend(fragment.indices.iter().map(|i| i + base));
        }
        mesh
    }
}

/// Parameters of one extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshingSettings {
    pub iso_level: f32,
    /// Size of the worker pool used for this extraction.
    pub workers: NonZeroUsize,
    pub assembly: Assembly,
    pub color: Vec3,
}

impl Default for MeshingSettings {
    fn default() -> Self {
        MeshingSettings {
            iso_level: 0.0,
            workers: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            assembly: Assembly::Fast,
            color: Vec3::ONE,
        }
    }
}

impl MeshingSettings {
    pub fn with_iso_level(mut self, iso_level: f32) -> Self {
        self.iso_level = iso_level;
        self
    }

    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = assembly;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }
}

/// Extracts the `iso_level` surface of `octree`.
///
/// With [`Assembly::Fast`] the result holds exactly `settings.workers` fragments, some of
/// which may be empty. With [`Assembly::Deduplicated`] it holds a single mesh.
#[instrument(skip_all, fields(
    nodes = octree.len(),
    workers = settings.workers.get(),
    assembly = ?settings.assembly
))]
pub fn extract_meshes(octree: &Octree, settings: &MeshingSettings) -> Result<Vec<Mesh>> {
    let field = octree.field()?;
    let workers = settings.workers.get();
    let pool = worker_pool(settings.workers)?;

    let (leaves, meshes) = pool.install(|| -> Result<_> {
        let leaves = gather_leaves(octree)?;
        let meshes = match settings.assembly {
            Assembly::Deduplicated => {
                let mut mesh = Mesh::new(Assembly::Deduplicated);
                for leaf in &leaves {
                    polygonise(leaf, settings.iso_level, &field, settings.color, &mut mesh);
                }
                vec![mesh]
            }
            Assembly::Fast => {
                let chunk_size = ((leaves.len() + workers - 1) / workers).max(1);
                let mut meshes: Vec<Mesh> = leaves
                    .par_chunks(chunk_size)
                    .map(|chunk| {
                        let mut mesh = Mesh::new(Assembly::Fast);
                        for leaf in chunk {
                            polygonise(leaf, settings.iso_level, &field, settings.color, &mut mesh);
                        }
                        mesh
                    })
                    .collect();
                meshes.resize_with(workers, Mesh::default);
                meshes
            }
        };
        Ok((leaves.len(), meshes))
    })?;

    info!(
        leaves,
        triangles = meshes.iter().map(Mesh::triangle_count).sum::<usize>(),
        vertices = meshes.iter().map(|m| m.vertices.len()).sum::<usize>(),
        fragments = meshes.len(),
        "extracted surface"
    );
    Ok(meshes)
}

/// [`extract_meshes`] followed by [`Mesh::concat`].
pub fn extract_mesh(octree: &Octree, settings: &MeshingSettings) -> Result<Mesh> {
    Ok(Mesh::concat(extract_meshes(octree, settings)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::tests::one_level;
    use crate::octree::Node;

    fn vertex(x: f32, y: f32, z: f32) -> Vertex {
        Vertex::new(Vec3::new(x, y, z), Vec3::Z)
    }

    fn settings(workers: usize, assembly: Assembly) -> MeshingSettings {
        MeshingSettings::default()
            .with_workers(NonZeroUsize::new(workers).unwrap())
            .with_assembly(assembly)
    }

    #[test]
    fn test_dedup_shares_vertices() {
        let mut mesh = Mesh::new(Assembly::Deduplicated);
        mesh.add_triangle(vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0));
        mesh.add_triangle(vertex(1.0, 0.0, 0.0), vertex(1.0, 1.0, 0.0), vertex(-0.0, 1.0, 0.0));
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 1, 3, 2]);
        assert_eq!(mesh.triangle_count(), 2);

        // Different normal or color is a different vertex.
        let mut other = vertex(0.0, 0.0, 0.0);
        other.normal = Vec3::X;
        assert_eq!(mesh.add_vertex(other), 4);
        other.color = Vec3::ZERO;
        assert_eq!(mesh.add_vertex(other), 5);
        assert_eq!(mesh.add_vertex(vertex(0.0, 0.0, 0.0)), 0);
    }

    #[test]
    fn test_fast_never_shares() {
        let mut mesh = Mesh::new(Assembly::Fast);
        let v = vertex(0.5, 0.5, 0.5);
        mesh.add_triangle(v, v, v);
        mesh.add_triangle(v, v, v);
        assert_eq!(mesh.vertices().len(), 6);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5]);

        mesh.clear();
        assert!(mesh.is_empty());
        assert_eq!(mesh.bounds(), None);
        assert_eq!(mesh.assembly(), Assembly::Fast);
    }

    #[test]
    fn test_hash_is_consistent_with_eq() {
        use std::collections::hash_map::DefaultHasher;
        let hash = |v: &Vertex| {
            let mut hasher = DefaultHasher::new();
            VertexKey::new(v).hash(&mut hasher);
            hasher.finish()
        };
        let a = vertex(0.0, -0.0, 1.0);
        let b = vertex(-0.0, 0.0, 1.0);
        assert!(VertexKey::new(&a) == VertexKey::new(&b));
        assert_eq!(hash(&a), hash(&b));
        assert!(ordered_bits((-1.0f32).to_bits()) < ordered_bits(0.0f32.to_bits()));
        assert!(ordered_bits(0.5f32.to_bits()) < ordered_bits(2.0f32.to_bits()));
        assert_eq!(spread_bits(0b111), 0b1001001);
    }

    #[test]
    fn test_concat_renumbers() {
        let mut a = Mesh::new(Assembly::Fast);
        a.add_triangle(vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0));
        let mut b = Mesh::new(Assembly::Deduplicated);
        b.add_triangle(vertex(0.0, 0.0, 2.0), vertex(1.0, 0.0, 2.0), vertex(0.0, 1.0, 2.0));
        b.add_triangle(vertex(0.0, 0.0, 2.0), vertex(1.0, 0.0, 2.0), vertex(1.0, 1.0, 2.0));

        let mesh = Mesh::concat([a, Mesh::default(), b]);
        assert_eq!(mesh.vertices().len(), 7);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5, 3, 4, 6]);
        assert_eq!(mesh.bounds(), Some((Vec3::ZERO, Vec3::new(1.0, 1.0, 2.0))));
    }

    #[test]
    fn test_uniform_children_emit_nothing() {
        let mut nodes = vec![Node {
            values: [1.0; 8],
            offset: 8,
        }];
        nodes.extend((1..16).map(|_| Node::leaf([1.0; 8])));
        let octree = Octree::new(nodes);

        for assembly in [Assembly::Fast, Assembly::Deduplicated] {
            let meshes = extract_meshes(&octree, &settings(3, assembly)).unwrap();
            assert!(meshes.iter().all(Mesh::is_empty));
        }
    }

    #[test]
    fn test_root_leaf_plane() {
        let octree = Octree::from_root([1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0]);
        let mesh = extract_mesh(&octree, &settings(2, Assembly::Fast)).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.vertices().iter().all(|v| v.position.z == 0.0));
    }

    #[test]
    fn test_fragment_per_worker() {
        let octree = one_level(|p| p.length() - 0.75);
        for workers in [1, 2, 3, 8, 13] {
            let meshes = extract_meshes(&octree, &settings(workers, Assembly::Fast)).unwrap();
            assert_eq!(meshes.len(), workers);
        }
        let meshes = extract_meshes(&octree, &settings(4, Assembly::Deduplicated)).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].assembly(), Assembly::Deduplicated);
    }

    #[test]
    fn test_fast_and_dedup_agree() {
        let octree = Octree::from_field(&|p: Vec3| p.length() - 0.6, 4);
        let fast = extract_mesh(&octree, &settings(4, Assembly::Fast)).unwrap();
        let dedup = extract_mesh(&octree, &settings(4, Assembly::Deduplicated)).unwrap();

        assert!(!fast.is_empty());
        assert_eq!(fast.triangle_count(), dedup.triangle_count());
        assert_eq!(fast.vertices().len(), fast.indices().len());
        assert!(dedup.vertices().len() < fast.vertices().len());

        let (fast_min, fast_max) = fast.bounds().unwrap();
        let (dedup_min, dedup_max) = dedup.bounds().unwrap();
        assert_eq!(fast_min, dedup_min);
        assert_eq!(fast_max, dedup_max);
    }

    #[test]
    fn test_corrupt_octree_fails() {
        let octree = Octree::new(vec![Node {
            values: [0.0; 8],
            offset: 4,
        }]);
        assert!(extract_meshes(&octree, &MeshingSettings::default()).is_err());
        assert!(extract_meshes(&Octree::default(), &MeshingSettings::default()).is_err());
    }

    #[test]
    fn test_children_stored_before_parent() {
        // Corner 0 of the root is split with values 2, the rest are leaves with values 1.
        let mut nodes = vec![Node {
            values: [0.0; 8],
            offset: 9,
        }];
        nodes.extend((1..9).map(|i| {
            let mut values = [2.0; 8];
            if i == 1 {
                values[0] = -1.0;
            }
            Node::leaf(values)
        }));
        nodes.push(Node {
            values: [0.0; 8],
            offset: 1,
        });
        nodes.extend((10..17).map(|_| Node::leaf([1.0; 8])));
        let octree = Octree::new(nodes);

        let settings = MeshingSettings::default().with_workers(NonZeroUsize::new(2).unwrap());
        let mesh = extract_mesh(&octree, &settings).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh
            .vertices()
            .iter()
            .all(|v| v.position.cmple(Vec3::splat(-0.5)).all()));
    }
}
