use super::{Mesh, Vertex};
use crate::error::{Error, Result};
use glam::Vec3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, instrument};

/// Writes positions, then normals, then one `f i//i j//j k//k` line per triangle.
///
/// Indices are 1-based, and each position index doubles as its normal index.
pub fn write_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> Result<()> {
    for vertex in mesh.vertices() {
        let p = vertex.position;
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for vertex in mesh.vertices() {
        let n = vertex.normal;
        writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for triangle in mesh.indices().chunks_exact(3) {
        let [a, b, c] = [triangle[0] + 1, triangle[1] + 1, triangle[2] + 1];
        writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    Ok(())
}

/// Reads back the subset of OBJ produced by [`write_obj`].
///
/// Comments and unknown statements are skipped. Vertices without a matching `vn` get a zero
/// normal, and every vertex is white.
pub fn read_obj<R: BufRead>(reader: R) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let error = |message: String| Error::Obj {
            line: number,
            message,
        };
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => positions.push(parse_vec3(&mut tokens).map_err(error)?),
            Some("vn") => normals.push(parse_vec3(&mut tokens).map_err(error)?),
            Some("f") => {
                let face: Vec<&str> = tokens.collect();
                if face.len() != 3 {
                    return Err(error(format!("expected a triangle, found {} corners", face.len())));
                }
                for corner in face {
                    // Only the position index is used; the normal index mirrors it.
                    let position = corner.split('/').next().unwrap_or(corner);
                    let index: u32 = position
                        .parse()
                        .map_err(|_| error(format!("invalid index {:?}", corner)))?;
                    if index == 0 {
                        return Err(error("indices start at 1".to_string()));
                    }
                    indices.push(index - 1);
                }
            }
            _ => {}
        }
    }

    if let Some(index) = indices.iter().find(|i| **i as usize >= positions.len()) {
        return Err(Error::Obj {
            line: 0,
            message: format!(
                "index {} refers past the {} vertices",
                index + 1,
                positions.len()
            ),
        });
    }

    let vertices = positions
        .into_iter()
        .enumerate()
        .map(|(i, position)| Vertex::new(position, normals.get(i).copied().unwrap_or(Vec3::ZERO)))
        .collect();
    Ok(Mesh::from_parts(vertices, indices))
}

fn parse_vec3<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Result<Vec3, String> {
    let mut v = [0.0f32; 3];
    for component in v.iter_mut() {
        let token = tokens.next().ok_or_else(|| "expected 3 components".to_string())?;
        *component = token
            .parse()
            .map_err(|_| format!("invalid number {:?}", token))?;
    }
    Ok(Vec3::from_array(v))
}

impl Mesh {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save_obj<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_obj(self, &mut writer)?;
        writer.flush()?;
        info!(
            vertices = self.vertices().len(),
            triangles = self.triangle_count(),
            "saved obj"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh> {
        read_obj(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesher::Assembly;

    #[test]
    fn test_write_format() {
        let mut mesh = Mesh::new(Assembly::Deduplicated);
        let a = Vertex::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z);
        let b = Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z);
        let c = Vertex::new(Vec3::new(0.0, 1.5, 0.0), Vec3::Z);
        let d = Vertex::new(Vec3::new(1.0, 1.0, -0.25), Vec3::Z);
        mesh.add_triangle(a, b, c);
        mesh.add_triangle(b, d, c);

        let mut out = Vec::new();
        write_obj(&mesh, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "v 0 0 0",
                "v 1 0 0",
                "v 0 1.5 0",
                "v 1 1 -0.25",
                "vn 0 0 1",
                "vn 0 0 1",
                "vn 0 0 1",
                "vn 0 0 1",
                "f 1//1 2//2 3//3",
                "f 2//2 4//4 3//3",
            ]
        );
    }

    #[test]
    fn test_read_back() {
        let text = "# comment\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\no name\nf 1//1 2//2 3//3\n";
        let mesh = read_obj(text.as_bytes()).unwrap();
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.vertices()[0].normal, Vec3::Z);
        assert_eq!(mesh.vertices()[2].normal, Vec3::ZERO);
        assert_eq!(mesh.vertices()[1].position, Vec3::X);
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(
            read_obj("v 0 0\n".as_bytes()),
            Err(Error::Obj { line: 1, .. })
        ));
        assert!(matches!(
            read_obj("v 0 0 0\nv 0 x 0\n".as_bytes()),
            Err(Error::Obj { line: 2, .. })
        ));
        assert!(matches!(
            read_obj("v 0 0 0\nf 1 1 1 1\n".as_bytes()),
            Err(Error::Obj { line: 2, .. })
        ));
        assert!(matches!(
            read_obj("v 0 0 0\nf 0//0 1//1 1//1\n".as_bytes()),
            Err(Error::Obj { line: 2, .. })
        ));
        assert!(read_obj("v 0 0 0\nf 1//1 2//2 1//1\n".as_bytes()).is_err());
    }
}
