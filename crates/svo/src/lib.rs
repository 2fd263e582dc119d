//! Sparse signed distance octrees and their conversion into triangle meshes.

pub mod bounds;
pub mod dir;
mod error;
pub mod field;
pub mod grid;
pub mod mesher;
pub mod octree;

pub use bounds::Bounds;
pub use dir::{Corner, Edge, Face};
pub use error::{Error, Result};
pub use field::ScalarField;
pub use grid::SdfGrid;
pub use mesher::{
    extract_mesh, extract_meshes, read_obj, write_obj, Assembly, Mesh, MeshingSettings, Vertex,
};
pub use octree::{collect_leaves, LeafVoxel, Node, Octree, OctreeField};
