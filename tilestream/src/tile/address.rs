//! Tile addressing.
//!
//! A [`TileAddress`] names one cell of the Web Mercator quadtree. It is the
//! key of every cache, map and set in the crate, so it is small, `Copy` and
//! ordered by `(zoom, y, x)` to make iteration deterministic.

use std::cmp::Ordering;
use std::fmt;

use crate::area::BoundedArea;
use crate::coord::{CoordError, MAX_ZOOM};

/// Cardinal direction from a tile towards one of its edge neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Grid step `(dx, dy)`; y grows southward.
    fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// Immutable quadtree tile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    /// Column, 0 at the antimeridian, growing east
    pub x: u32,
    /// Row, 0 at the northern edge, growing south
    pub y: u32,
    /// Zoom level
    pub zoom: u8,
}

impl TileAddress {
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Number of tiles along one axis at `zoom`.
    #[inline]
    pub fn grid_size(zoom: u8) -> u64 {
        1u64 << zoom
    }

    /// `0 <= x, y < 2^zoom` and zoom within range.
    pub fn is_valid(&self) -> bool {
        let n = Self::grid_size(self.zoom);
        self.zoom <= MAX_ZOOM && (self.x as u64) < n && (self.y as u64) < n
    }

    pub fn parent(&self) -> Option<TileAddress> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileAddress::new(self.x >> 1, self.y >> 1, self.zoom - 1))
    }

    /// The ancestor at `zoom`, or `self` when `zoom` equals this tile's zoom.
    pub fn ancestor(&self, zoom: u8) -> Option<TileAddress> {
        if zoom > self.zoom {
            return None;
        }
        let shift = self.zoom - zoom;
        Some(TileAddress::new(self.x >> shift, self.y >> shift, zoom))
    }

    /// The four children in row-major order: NW, NE, SW, SE.
    pub fn children(&self) -> [TileAddress; 4] {
        let (x, y, z) = (self.x << 1, self.y << 1, self.zoom + 1);
        [
            TileAddress::new(x, y, z),
            TileAddress::new(x + 1, y, z),
            TileAddress::new(x, y + 1, z),
            TileAddress::new(x + 1, y + 1, z),
        ]
    }

    /// Same-zoom neighbor across the given edge.
    ///
    /// Returns `None` past the northern/southern map edge. East/west wrap
    /// around the antimeridian.
    pub fn neighbor(&self, direction: Direction) -> Option<TileAddress> {
        let n = Self::grid_size(self.zoom) as i64;
        let (dx, dy) = direction.delta();

        let y = self.y as i64 + dy;
        if y < 0 || y >= n {
            return None;
        }
        let x = (self.x as i64 + dx).rem_euclid(n);
        if n == 1 && dx != 0 {
            // a single world tile has no distinct east/west neighbor
            return None;
        }
        Some(TileAddress::new(x as u32, y as u32, self.zoom))
    }

    /// True when `other` is this tile or one of its descendants.
    pub fn contains(&self, other: &TileAddress) -> bool {
        other.ancestor(self.zoom) == Some(*self)
    }

    /// Offset of this tile inside `ancestor`, in tiles of this zoom.
    pub fn offset_in(&self, ancestor: &TileAddress) -> Option<(u32, u32)> {
        if !ancestor.contains(self) {
            return None;
        }
        let shift = self.zoom - ancestor.zoom;
        Some((
            self.x - (ancestor.x << shift),
            self.y - (ancestor.y << shift),
        ))
    }

    /// Geographic extent of the tile.
    pub fn area(&self) -> BoundedArea {
        BoundedArea::from_tile(*self)
    }

    /// Bing-style quadkey.
    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(self.zoom as usize);
        for i in (1..=self.zoom).rev() {
            let mask = 1u32 << (i - 1);
            let mut digit = b'0';
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push(digit as char);
        }
        key
    }

    /// Parses a Bing-style quadkey.
    pub fn from_quadkey(quadkey: &str) -> Result<TileAddress, CoordError> {
        if quadkey.len() > MAX_ZOOM as usize {
            return Err(CoordError::InvalidQuadkey(quadkey.to_string()));
        }

        let (mut x, mut y) = (0u32, 0u32);
        for c in quadkey.chars() {
            x <<= 1;
            y <<= 1;
            match c {
                '0' => {}
                '1' => x |= 1,
                '2' => y |= 1,
                '3' => {
                    x |= 1;
                    y |= 1;
                }
                _ => return Err(CoordError::InvalidQuadkey(quadkey.to_string())),
            }
        }
        Ok(TileAddress::new(x, y, quadkey.len() as u8))
    }
}

impl Ord for TileAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.zoom, self.y, self.x).cmp(&(other.zoom, other.y, other.x))
    }
}

impl PartialOrd for TileAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}
