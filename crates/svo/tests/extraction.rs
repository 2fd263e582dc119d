use glam::Vec3;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use svo::{
    collect_leaves, extract_mesh, extract_meshes, read_obj, write_obj, Assembly, Bounds, Corner,
    Mesh, MeshingSettings, Node, Octree, ScalarField,
};

/// Random tree with children laid out breadth-first.
fn random_octree(rng: &mut StdRng, max_depth: u32) -> Octree {
    let mut nodes = vec![Node::leaf(rng.gen())];
    let mut queue = VecDeque::from([(0usize, 0u32)]);
    while let Some((index, depth)) = queue.pop_front() {
        if depth >= max_depth || !rng.gen_bool(0.5) {
            continue;
        }
        let offset = nodes.len();
        nodes[index].offset = offset as u32;
        for i in 0..8 {
            let values: [f32; 8] = std::array::from_fn(|_| rng.gen_range(-1.0..1.0));
            nodes.push(Node::leaf(values));
            queue.push_back((offset + i, depth + 1));
        }
    }
    Octree::new(nodes)
}

fn settings(workers: usize, assembly: Assembly) -> MeshingSettings {
    MeshingSettings::default()
        .with_workers(NonZeroUsize::new(workers).unwrap())
        .with_assembly(assembly)
}

#[test]
fn leaves_tile_the_root() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..32 {
        let octree = random_octree(&mut rng, 5);
        octree.validate().unwrap();
        let leaves = collect_leaves(&octree, NonZeroUsize::new(4).unwrap()).unwrap();
        let leaf_nodes = octree.nodes().iter().filter(|n| n.is_leaf()).count();
        assert_eq!(leaves.len(), leaf_nodes);

        let volume: f64 = leaves.iter().map(|l| l.bounds.volume() as f64).sum();
        assert!((volume - 8.0).abs() < 1e-6, "volume {}", volume);
        for leaf in &leaves {
            assert!(leaf.min_corner().cmpge(Bounds::ROOT.min).all());
            assert!(leaf.bounds.max().cmple(Bounds::ROOT.max()).all());
        }
    }
}

#[test]
fn sampler_matches_leaf_corners() {
    let mut rng = StdRng::seed_from_u64(11);
    let octree = random_octree(&mut rng, 4);
    let field = octree.field().unwrap();
    for leaf in collect_leaves(&octree, NonZeroUsize::new(4).unwrap()).unwrap() {
        // The sampler picks the upper neighbour on shared faces, so probe just inside.
        let inset = leaf.voxel_size() * 1e-3;
        let p = leaf.min_corner() + Vec3::splat(inset);
        let expected = leaf.sample(p);
        assert!((octree.sample(p).unwrap() - expected).abs() < 1e-4);
        assert!((field.sample(p) - expected).abs() < 1e-4);
        let corner = leaf.sample(leaf.bounds.corner(Corner::RearRightTop));
        assert!((corner - leaf.values[7]).abs() < 1e-6);
    }
}

#[test]
fn sphere_vertices_lie_on_surface() {
    let radius = 0.6;
    let octree = Octree::from_field(&|p: Vec3| p.length() - radius, 5);
    let mesh = extract_mesh(&octree, &settings(4, Assembly::Fast)).unwrap();
    assert!(mesh.triangle_count() > 100);

    let cell = 2.0 / 32.0;
    for vertex in mesh.vertices() {
        assert!((vertex.position.length() - radius).abs() < cell);
        // Normals of a sphere point away from its center.
        assert!(vertex.normal.dot(vertex.position.normalize()) > 0.9);
    }
}

#[test]
fn worker_count_does_not_change_geometry() {
    let octree = Octree::from_field(&|p: Vec3| (p - Vec3::new(0.1, -0.2, 0.05)).length() - 0.45, 4);
    let sorted_positions = |mesh: &Mesh| {
        let mut positions: Vec<[u32; 3]> = mesh
            .vertices()
            .iter()
            .map(|v| v.position.to_array().map(f32::to_bits))
            .collect();
        positions.sort_unstable();
        positions
    };

    let reference = extract_mesh(&octree, &settings(1, Assembly::Fast)).unwrap();
    for workers in [2, 5, 16] {
        let meshes = extract_meshes(&octree, &settings(workers, Assembly::Fast)).unwrap();
        assert_eq!(meshes.len(), workers);
        let mesh = Mesh::concat(meshes);
        assert_eq!(sorted_positions(&mesh), sorted_positions(&reference));
    }

    let dedup = extract_mesh(&octree, &settings(3, Assembly::Deduplicated)).unwrap();
    assert_eq!(dedup.triangle_count(), reference.triangle_count());
    let again = extract_mesh(&octree, &settings(3, Assembly::Deduplicated)).unwrap();
    assert_eq!(dedup.vertices(), again.vertices());
    assert_eq!(dedup.indices(), again.indices());
}

#[test]
fn octree_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("random.octree");
    let mut rng = StdRng::seed_from_u64(3);
    let octree = random_octree(&mut rng, 4);

    octree.save(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 4 + octree.len() * 36);

    let loaded = Octree::load(&path).unwrap();
    assert_eq!(loaded, octree);

    loaded.save(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn obj_round_trip() {
    let octree = Octree::from_field(&|p: Vec3| p.length() - 0.5, 3);
    let mesh = extract_mesh(&octree, &settings(2, Assembly::Deduplicated)).unwrap();

    let mut bytes = Vec::new();
    write_obj(&mesh, &mut bytes).unwrap();
    let loaded = read_obj(bytes.as_slice()).unwrap();

    assert_eq!(loaded.indices(), mesh.indices());
    assert_eq!(loaded.vertices().len(), mesh.vertices().len());
    for (a, b) in loaded.vertices().iter().zip(mesh.vertices()) {
        assert_eq!(a.position, b.position);
        assert_eq!(a.normal, b.normal);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sphere.obj");
    mesh.save_obj(&path).unwrap();
    assert_eq!(Mesh::load_obj(&path).unwrap().indices(), mesh.indices());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Octree::load(dir.path().join("nope.octree")),
        Err(svo::Error::Io(_))
    ));
}
