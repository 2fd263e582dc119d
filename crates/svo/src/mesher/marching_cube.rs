use super::tables::{EDGE_TABLE, RING_TO_CORNER, TRI_TABLE};
use super::{Mesh, Vertex};
use crate::dir::Edge;
use crate::field::ScalarField;
use crate::octree::LeafVoxel;
use glam::Vec3;

/// Field values closer than this are treated as equal during edge interpolation.
pub const ISO_EPSILON: f32 = 1e-5;

/// Point on the segment `a..b` where the field crosses `iso_level`.
///
/// Endpoints sitting on the iso level, and edges too flat to divide by, snap to an endpoint.
#[inline]
pub fn interpolate(iso_level: f32, a: Vec3, b: Vec3, value_a: f32, value_b: f32) -> Vec3 {
    if (iso_level - value_a).abs() < ISO_EPSILON {
        return a;
    }
    if (iso_level - value_b).abs() < ISO_EPSILON {
        return b;
    }
    if (value_a - value_b).abs() < ISO_EPSILON {
        return a;
    }
    let t = (iso_level - value_a) / (value_b - value_a);
    a + t * (b - a)
}

/// 8 bit case index into the lookup tables. Bit `i` is set when ring corner `i` is below
/// `iso_level`.
#[inline]
pub fn cube_index(values: &[f32; 8], iso_level: f32) -> u8 {
    RING_TO_CORNER
        .iter()
        .enumerate()
        .fold(0, |index, (bit, corner)| {
            if values[*corner as usize] < iso_level {
                index | 1 << bit
            } else {
                index
            }
        })
}

/// Triangulates one leaf voxel into `mesh` and returns the number of triangles emitted.
///
/// Normals come from the gradient of `field` at each vertex.
pub fn polygonise<F: ScalarField + ?Sized>(
    voxel: &LeafVoxel,
    iso_level: f32,
    field: &F,
    color: Vec3,
    mesh: &mut Mesh,
) -> usize {
    let cube_index = cube_index(&voxel.values, iso_level) as usize;
    let edge_mask = EDGE_TABLE[cube_index];
    if edge_mask == 0 {
        return 0;
    }

    let corners = voxel.bounds.corners();
    let mut points = [Vec3::ZERO; 12];
    for edge in Edge::all() {
        if edge_mask & (1 << edge as u16) == 0 {
            continue;
        }
        let (a, b) = edge.vertices();
        points[edge as usize] = interpolate(
            iso_level,
            corners[a as usize],
            corners[b as usize],
            voxel.values[a as usize],
            voxel.values[b as usize],
        );
    }

    let mut triangles = 0;
    for triple in TRI_TABLE[cube_index].chunks_exact(3) {
        if triple[0] < 0 {
            break;
        }
        let [a, b, c] = [triple[0], triple[1], triple[2]].map(|edge| {
            let position = points[edge as usize];
            Vertex {
                position,
                normal: field.normal(position),
                color,
            }
        });
        mesh.add_triangle(a, b, c);
        triangles += 1;
    }
    triangles
}
