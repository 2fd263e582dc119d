use crate::bounds::Bounds;
use crate::error::{Error, Result};
use crate::field::ScalarField;
use crate::octree::read_exact_or_truncated;
use glam::{UVec3, Vec3};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::Path;
use tracing::{info, instrument};

/// Dense signed distance samples covering [`Bounds::ROOT`], x varying fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct SdfGrid {
    size: UVec3,
    data: Vec<f32>,
}

/// Number of samples in a grid of `size`, or `None` if the product overflows `usize`.
fn sample_count(size: UVec3) -> Option<usize> {
    (size.x as usize)
        .checked_mul(size.y as usize)?
        .checked_mul(size.z as usize)
}

fn invalid(size: UVec3, values: usize) -> Error {
    Error::InvalidGrid {
        size: size.to_array(),
        values,
    }
}

impl SdfGrid {
    pub fn new(size: UVec3, data: Vec<f32>) -> Result<Self> {
        let expected = sample_count(size).ok_or_else(|| invalid(size, data.len()))?;
        if expected == 0 || data.len() != expected {
            return Err(invalid(size, data.len()));
        }
        Ok(SdfGrid { size, data })
    }

    /// Samples `field` at `size` evenly spaced points per axis, including both ends.
    pub fn from_field<F: ScalarField + ?Sized>(field: &F, size: UVec3) -> Result<Self> {
        let step = |n: u32| if n > 1 { 2.0 / (n - 1) as f32 } else { 0.0 };
        let step = Vec3::new(step(size.x), step(size.y), step(size.z));
        let count = sample_count(size).ok_or_else(|| invalid(size, 0))?;
        let mut data = Vec::with_capacity(count);
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let p = Bounds::ROOT.min + UVec3::new(x, y, z).as_vec3() * step;
                    data.push(field.sample(p));
                }
            }
        }
        SdfGrid::new(size, data)
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn distance(&self, x: u32, y: u32, z: u32) -> f32 {
        self.data[x as usize
            + y as usize * self.size.x as usize
            + z as usize * self.size.x as usize * self.size.y as usize]
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for n in self.size.to_array() {
            writer.write_all(&n.to_ne_bytes())?;
        }
        writer.write_all(bytemuck::cast_slice::<f32, u8>(&self.data))?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<SdfGrid> {
        let mut header = [0u32; 3];
        read_exact_or_truncated(reader, bytemuck::cast_slice_mut(&mut header), 0)?;
        let size = UVec3::from_array(header);
        let expected = sample_count(size)
            .and_then(|count| count.checked_mul(size_of::<f32>()))
            .ok_or_else(|| invalid(size, 0))?;

        let mut data: Vec<f32> = Vec::new();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() < expected {
            return Err(Error::Truncated {
                expected: size_of::<[u32; 3]>() + expected,
                found: size_of::<[u32; 3]>() + bytes.len(),
            });
        }
        data.extend(
            bytes[..expected]
                .chunks_exact(size_of::<f32>())
                .map(bytemuck::pod_read_unaligned::<f32>),
        );
        SdfGrid::new(size, data)
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        info!(size = ?self.size, "saved sdf grid");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SdfGrid> {
        let grid = SdfGrid::read(&mut BufReader::new(File::open(path)?))?;
        info!(size = ?grid.size, "loaded sdf grid");
        Ok(grid)
    }
}

impl ScalarField for SdfGrid {
    fn sample(&self, point: Vec3) -> f32 {
        let normalized = Bounds::ROOT.local(point);
        let scaled = normalized * (self.size.as_vec3() - Vec3::ONE);
        let max = self.size.as_ivec3() - 1;

        let base = scaled.floor().as_ivec3();
        let (u, v, w) = (
            scaled.x - base.x as f32,
            scaled.y - base.y as f32,
            scaled.z - base.z as f32,
        );
        let lo = base.clamp(glam::IVec3::ZERO, max).as_uvec3();
        let hi = (base + 1).clamp(glam::IVec3::ZERO, max).as_uvec3();

        let v000 = self.distance(lo.x, lo.y, lo.z);
        let v100 = self.distance(hi.x, lo.y, lo.z);
        let v010 = self.distance(lo.x, hi.y, lo.z);
        let v110 = self.distance(hi.x, hi.y, lo.z);
        let v001 = self.distance(lo.x, lo.y, hi.z);
        let v101 = self.distance(hi.x, lo.y, hi.z);
        let v011 = self.distance(lo.x, hi.y, hi.z);
        let v111 = self.distance(hi.x, hi.y, hi.z);

        let c00 = v000 * (1.0 - u) + v100 * u;
        let c10 = v010 * (1.0 - u) + v110 * u;
        let c01 = v001 * (1.0 - u) + v101 * u;
        let c11 = v011 * (1.0 - u) + v111 * u;

        let c0 = c00 * (1.0 - v) + c10 * v;
        let c1 = c01 * (1.0 - v) + c11 * v;

        c0 * (1.0 - w) + c1 * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(p: Vec3) -> f32 {
        p.x - 0.25 * p.z
    }

    #[test]
    fn test_sample_linear_field() {
        let grid = SdfGrid::from_field(&plane, UVec3::new(5, 3, 9)).unwrap();
        for p in [
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-0.33, 0.9, 0.75),
        ] {
            assert!((grid.sample(p) - plane(p)).abs() < 1e-5, "{:?}", p);
        }
    }

    #[test]
    fn test_round_trip() {
        let grid = SdfGrid::from_field(&|p: Vec3| p.length() - 0.5, UVec3::splat(4)).unwrap();
        let mut bytes = Vec::new();
        grid.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 12 + 64 * 4);
        assert_eq!(SdfGrid::read(&mut bytes.as_slice()).unwrap(), grid);

        bytes.truncate(40);
        assert!(matches!(
            SdfGrid::read(&mut bytes.as_slice()),
            Err(Error::Truncated { expected: 268, found: 40 })
        ));
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(
            SdfGrid::new(UVec3::new(2, 2, 0), vec![]),
            Err(Error::InvalidGrid { .. })
        ));
        assert!(SdfGrid::new(UVec3::new(2, 1, 1), vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_oversized_header() {
        let mut bytes = Vec::new();
        for n in [u32::MAX; 3] {
            bytes.extend_from_slice(&n.to_ne_bytes());
        }
        bytes.extend_from_slice(&[0; 16]);
        assert!(matches!(
            SdfGrid::read(&mut bytes.as_slice()),
            Err(Error::InvalidGrid {
                size: [u32::MAX, u32::MAX, u32::MAX],
                values: 0
            })
        ));
        assert!(matches!(
            SdfGrid::new(UVec3::splat(u32::MAX), vec![0.0; 4]),
            Err(Error::InvalidGrid { values: 4, .. })
        ));
        assert!(SdfGrid::from_field(&plane, UVec3::splat(u32::MAX)).is_err());
    }
}
