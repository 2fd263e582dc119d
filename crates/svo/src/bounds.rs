use crate::{Corner, Face};
use glam::Vec3;

/// A cube with the origin at `min`
/// spanning in +x, +y, +z direction with width `width`
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Bounds {
    pub min: Vec3,
    pub width: f32,
}

impl Bounds {
    /// The cube covered by the root node of every octree.
    pub const ROOT: Bounds = Bounds {
        min: Vec3::splat(-1.0),
        width: 2.0,
    };

    pub fn new(min: Vec3, width: f32) -> Self {
        Bounds { min, width }
    }

    pub fn max(&self) -> Vec3 {
        self.min + Vec3::splat(self.width)
    }

    pub fn center(&self) -> Vec3 {
        self.min + Vec3::splat(self.width * 0.5)
    }

    pub fn volume(&self) -> f32 {
        self.width * self.width * self.width
    }

    pub fn corner(&self, corner: Corner) -> Vec3 {
        let (x, y, z) = corner.position_offset();
        self.min + Vec3::new(x as f32, y as f32, z as f32) * self.width
    }

    /// World-space positions of all 8 corners, indexed by [`Corner`].
    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for corner in Corner::all() {
            corners[corner as usize] = self.corner(corner);
        }
        corners
    }

    pub fn half(&self, dir: Corner) -> Bounds {
        let width = self.width * 0.5;
        let mut min = self.min;
        if dir.is_on_face(Face::Right) {
            min.x += width;
        }
        if dir.is_on_face(Face::Top) {
            min.y += width;
        }
        if dir.is_on_face(Face::Rear) {
            min.z += width;
        }
        Bounds { min, width }
    }

    /// The child octant containing `point`. Points on the center plane go to the upper half.
    #[inline]
    pub fn octant_of(&self, point: Vec3) -> Corner {
        let center = self.center();
        let index = (point.x >= center.x) as u8
            | ((point.y >= center.y) as u8) << 1
            | ((point.z >= center.z) as u8) << 2;
        index.into()
    }

    /// Position of `point` relative to this cube, in `[0, 1]^3` when contained.
    #[inline]
    pub fn local(&self, point: Vec3) -> Vec3 {
        (point - self.min) / self.width
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::ROOT
    }
}
