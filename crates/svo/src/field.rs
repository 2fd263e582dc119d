use glam::Vec3;

/// Step used for central-difference gradients.
pub const GRADIENT_EPSILON: f32 = 1e-4;

/// A scalar (signed distance) field that can be point-sampled.
pub trait ScalarField: Sync {
    fn sample(&self, point: Vec3) -> f32;

    fn gradient(&self, point: Vec3) -> Vec3 {
        let dx = Vec3::X * GRADIENT_EPSILON;
        let dy = Vec3::Y * GRADIENT_EPSILON;
        let dz = Vec3::Z * GRADIENT_EPSILON;
        Vec3::new(
            self.sample(point + dx) - self.sample(point - dx),
            self.sample(point + dy) - self.sample(point - dy),
            self.sample(point + dz) - self.sample(point - dz),
        ) / (2.0 * GRADIENT_EPSILON)
    }

    /// Unit surface normal, pointing towards increasing field values.
    /// Zero where the gradient vanishes.
    fn normal(&self, point: Vec3) -> Vec3 {
        self.gradient(point).normalize_or_zero()
    }
}

impl<F> ScalarField for F
where
    F: Fn(Vec3) -> f32 + Sync,
{
    #[inline]
    fn sample(&self, point: Vec3) -> f32 {
        self(point)
    }
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Trilinear interpolation of 8 corner values indexed by [`crate::Corner`].
#[inline]
pub(crate) fn trilinear(values: &[f32; 8], local: Vec3) -> f32 {
    let c00 = lerp(values[0b000], values[0b001], local.x);
    let c10 = lerp(values[0b010], values[0b011], local.x);
    let c01 = lerp(values[0b100], values[0b101], local.x);
    let c11 = lerp(values[0b110], values[0b111], local.x);

    let c0 = lerp(c00, c10, local.y);
    let c1 = lerp(c01, c11, local.y);

    lerp(c0, c1, local.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trilinear_corners() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        for i in 0..8u8 {
            let local = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
            assert_eq!(trilinear(&values, local), values[i as usize]);
        }
        assert_eq!(trilinear(&values, Vec3::splat(0.5)), 3.5);
    }

    #[test]
    fn test_closure_normal() {
        let sphere = |p: Vec3| p.length() - 0.5;
        let n = sphere.normal(Vec3::new(0.5, 0.0, 0.0));
        assert!((n - Vec3::X).length() < 1e-3);
    }
}
