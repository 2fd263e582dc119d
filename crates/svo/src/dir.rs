//          Cell Corners
//
//       6-------------------7
//      /|                  /|
//     / |                 / |
//    /  |                /  |
//   2-------------------3   |
//   |   |               |   |
//   |   |               |   |
//   |   |               |   |
//   |   4---------------|---5
//   |  /                |  /
//   | /                 | /
//   |/                  |/
//   0-------------------1
//
//      +y
//       |   +z
//       |  /
//       | /
//       --------- +x
//
// bit 0 = +x, bit 1 = +y, bit 2 = +z

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Corner {
    FrontLeftBottom = 0b000,
    FrontRightBottom = 0b001,
    FrontLeftTop = 0b010,
    FrontRightTop = 0b011,
    RearLeftBottom = 0b100,
    RearRightBottom = 0b101,
    RearLeftTop = 0b110,
    RearRightTop = 0b111,
}

impl Corner {
    const ALL: [Corner; 8] = [
        Corner::FrontLeftBottom,
        Corner::FrontRightBottom,
        Corner::FrontLeftTop,
        Corner::FrontRightTop,
        Corner::RearLeftBottom,
        Corner::RearRightBottom,
        Corner::RearLeftTop,
        Corner::RearRightTop,
    ];

    #[inline]
    pub fn is_on_face(&self, face: Face) -> bool {
        let n = *self as u8;
        match face {
            Face::Left => n & 0b001 == 0,
            Face::Right => n & 0b001 != 0,
            Face::Bottom => n & 0b010 == 0,
            Face::Top => n & 0b010 != 0,
            Face::Front => n & 0b100 == 0,
            Face::Rear => n & 0b100 != 0,
        }
    }

    /// Unit offset of this corner from the minimum corner of its cell.
    #[inline]
    pub fn position_offset(&self) -> (u8, u8, u8) {
        let a = *self as u8;
        (a & 0b1, (a >> 1) & 0b1, (a >> 2) & 0b1)
    }

    pub fn all() -> AllDirectionIterator {
        AllDirectionIterator { current: 0 }
    }
}

pub struct AllDirectionIterator {
    current: u8,
}

impl Iterator for AllDirectionIterator {
    type Item = Corner;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= 8 {
            None
        } else {
            let item: Corner = self.current.into();
            self.current += 1;
            Some(item)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = 8 - self.current as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AllDirectionIterator {}

impl From<u8> for Corner {
    fn from(num: u8) -> Self {
        assert!(num < 8);
        Corner::ALL[num as usize]
    }
}

// Edges follow the classic marching cubes numbering, which walks the corners
// of each z face as a ring: 0 -> 1 -> 3 -> 2.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Edge {
    FrontBottom = 0,
    FrontRight = 1,
    FrontTop = 2,
    FrontLeft = 3,

    RearBottom = 4,
    RearRight = 5,
    RearTop = 6,
    RearLeft = 7,

    DepthLeftBottom = 8,
    DepthRightBottom = 9,
    DepthRightTop = 10,
    DepthLeftTop = 11,
}

impl Edge {
    const ALL: [Edge; 12] = [
        Edge::FrontBottom,
        Edge::FrontRight,
        Edge::FrontTop,
        Edge::FrontLeft,
        Edge::RearBottom,
        Edge::RearRight,
        Edge::RearTop,
        Edge::RearLeft,
        Edge::DepthLeftBottom,
        Edge::DepthRightBottom,
        Edge::DepthRightTop,
        Edge::DepthLeftTop,
    ];

    pub fn all() -> impl ExactSizeIterator<Item = Edge> {
        Self::ALL.into_iter()
    }

    pub fn vertices(&self) -> (Corner, Corner) {
        use Corner::*;
        match self {
            Edge::FrontBottom => (FrontLeftBottom, FrontRightBottom),
            Edge::FrontRight => (FrontRightBottom, FrontRightTop),
            Edge::FrontTop => (FrontRightTop, FrontLeftTop),
            Edge::FrontLeft => (FrontLeftTop, FrontLeftBottom),

            Edge::RearBottom => (RearLeftBottom, RearRightBottom),
            Edge::RearRight => (RearRightBottom, RearRightTop),
            Edge::RearTop => (RearRightTop, RearLeftTop),
            Edge::RearLeft => (RearLeftTop, RearLeftBottom),

            Edge::DepthLeftBottom => (FrontLeftBottom, RearLeftBottom),
            Edge::DepthRightBottom => (FrontRightBottom, RearRightBottom),
            Edge::DepthRightTop => (FrontRightTop, RearRightTop),
            Edge::DepthLeftTop => (FrontLeftTop, RearLeftTop),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Face {
    Top = 0,
    Bottom = 1,
    Left = 2,
    Right = 3,
    Front = 4,
    Rear = 5,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_bits() {
        assert_eq!(Corner::FrontRightBottom.position_offset(), (1, 0, 0));
        assert_eq!(Corner::FrontLeftTop.position_offset(), (0, 1, 0));
        assert_eq!(Corner::RearLeftBottom.position_offset(), (0, 0, 1));
        for corner in Corner::all() {
            let (x, y, z) = corner.position_offset();
            assert_eq!(corner.is_on_face(Face::Right), x == 1);
            assert_eq!(corner.is_on_face(Face::Top), y == 1);
            assert_eq!(corner.is_on_face(Face::Rear), z == 1);
        }
    }

    #[test]
    fn test_edges_join_adjacent_corners() {
        for edge in Edge::all() {
            let (a, b) = edge.vertices();
            // Exactly one axis differs between the two endpoints.
            assert_eq!((a as u8 ^ b as u8).count_ones(), 1, "{:?}", edge);
        }
    }
}
