use super::{Node, Octree};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::Path;
use tracing::{info, instrument};

const READ_CHUNK_NODES: usize = 1 << 16;

/// The node count as stored in the file header.
fn node_count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::TooManyNodes { len })
}

/// File structures:
/// node_count: u32
/// NODE DATA: node_count * (8 * f32 values, u32 offset)
/// EOF
///
/// Everything is stored in native byte order without padding.
impl Octree {
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let count = node_count(self.nodes.len())?;
        writer.write_all(&count.to_ne_bytes())?;
        writer.write_all(bytemuck::cast_slice::<Node, u8>(&self.nodes))?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Octree> {
        let mut count = [0u8; size_of::<u32>()];
        read_exact_or_truncated(reader, &mut count, 0)?;
        let count = u32::from_ne_bytes(count) as usize;

        // Grow as data arrives instead of trusting the header with one large allocation.
        let mut nodes: Vec<Node> = Vec::new();
        while nodes.len() < count {
            let start = nodes.len();
            let end = count.min(start + READ_CHUNK_NODES);
            nodes.resize(end, Node::default());
            read_exact_or_truncated(
                reader,
                bytemuck::cast_slice_mut::<Node, u8>(&mut nodes[start..]),
                size_of::<u32>() + start * size_of::<Node>(),
            )?;
        }
        Ok(Octree { nodes })
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        info!(nodes = self.nodes.len(), "saved octree");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Octree> {
        let mut reader = BufReader::new(File::open(path)?);
        let octree = Octree::read(&mut reader)?;
        info!(nodes = octree.nodes.len(), "loaded octree");
        Ok(octree)
    }

    /// Writes a human readable listing of every node.
    pub fn write_text_dump<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "SDF Octree Dump:")?;
        writeln!(writer, "Total nodes: {}", self.nodes.len())?;
        writeln!(writer, "----------------------------------------")?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(writer, "Node [{}]:", i)?;
            let values = node
                .values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(writer, "  Values: [{}]", values)?;
            writeln!(writer, "  Offset: {}", node.offset)?;
            if node.is_leaf() {
                writeln!(writer, "  Type: Leaf Node")?;
            } else {
                writeln!(
                    writer,
                    "  Type: Internal Node (children {}..{})",
                    node.offset,
                    node.offset as usize + 8
                )?;
            }
            writeln!(writer, "----------------------------------------")?;
        }
        Ok(())
    }
}

/// Like `read_exact`, but reports how many bytes were actually available on a short read.
pub(crate) fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    already_read: usize,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::Truncated {
                    expected: already_read + buf.len(),
                    found: already_read + filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::tests::one_level;

    #[test]
    fn test_round_trip_bytes() {
        let octree = one_level(|p| p.length() - 0.5);
        let mut bytes = Vec::new();
        octree.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 9 * 36);
        assert_eq!(&bytes[..4], &9u32.to_ne_bytes());

        let loaded = Octree::read(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded, octree);

        let mut again = Vec::new();
        loaded.write(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_node_layout() {
        assert_eq!(size_of::<Node>(), 36);
        let node = Node {
            values: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            offset: 42,
        };
        let bytes = bytemuck::bytes_of(&node);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[32..36], &42u32.to_ne_bytes());
    }

    #[test]
    fn test_truncated() {
        let octree = one_level(|p| p.x);
        let mut bytes = Vec::new();
        octree.write(&mut bytes).unwrap();
        bytes.truncate(100);
        match Octree::read(&mut bytes.as_slice()) {
            Err(Error::Truncated { expected, found }) => {
                assert_eq!(expected, 4 + 9 * 36);
                assert_eq!(found, 100);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            Octree::read(&mut [1u8, 0].as_slice()),
            Err(Error::Truncated { expected: 4, found: 2 })
        ));
    }

    #[test]
    fn test_empty_file_holds_no_nodes() {
        let bytes = 0u32.to_ne_bytes();
        let octree = Octree::read(&mut bytes.as_slice()).unwrap();
        assert!(octree.is_empty());
    }

    #[test]
    fn test_text_dump() {
        let octree = one_level(|_| 0.5);
        let mut out = Vec::new();
        octree.write_text_dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("SDF Octree Dump:\nTotal nodes: 9\n"));
        assert!(text.contains("Node [0]:\n  Values: [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]\n  Offset: 1\n  Type: Internal Node (children 1..9)"));
        assert_eq!(text.matches("Type: Leaf Node").count(), 8);
    }

    #[test]
    fn test_node_count_header() {
        assert_eq!(node_count(17).unwrap(), 17);
        assert_eq!(node_count(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            node_count(u32::MAX as usize + 1),
            Err(Error::TooManyNodes { len }) if len == 1 << 32
        ));
    }
}
