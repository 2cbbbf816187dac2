//! Red/black phase partition and the adaptive neighbour regions.
//!
//! Every offset in every region has an odd coordinate sum, so a pixel of one
//! colour only ever reads pixels of the other colour.

/// One half of the checkerboard partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pixels with even `x + y`.
    Red,
    /// Pixels with odd `x + y`.
    Black,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Red, Phase::Black];

    #[inline]
    pub fn of(x: usize, y: usize) -> Phase {
        if (x + y) % 2 == 0 {
            Phase::Red
        } else {
            Phase::Black
        }
    }

    #[inline]
    pub fn owns(self, x: usize, y: usize) -> bool {
        Phase::of(x, y) == self
    }

    pub fn other(self) -> Phase {
        match self {
            Phase::Red => Phase::Black,
            Phase::Black => Phase::Red,
        }
    }
}

/// Near region opening upwards: a V of five pixels.
const NEAR_UP: [(i32, i32); 5] = [(0, -1), (-1, -2), (1, -2), (-2, -3), (2, -3)];
/// Far region upwards: every other pixel along the axis.
const FAR_UP: [(i32, i32); 11] = [
    (0, -3),
    (0, -5),
    (0, -7),
    (0, -9),
    (0, -11),
    (0, -13),
    (0, -15),
    (0, -17),
    (0, -19),
    (0, -21),
    (0, -23),
];

/// Rotate an offset by 90° (up → right → down → left).
#[inline]
fn rotate((dx, dy): (i32, i32)) -> (i32, i32) {
    (-dy, dx)
}

/// The eight candidate regions: four near V-shapes, then four far axial runs.
#[derive(Clone, Debug)]
pub struct NeighborRegions {
    regions: Vec<Vec<(i32, i32)>>,
}

impl Default for NeighborRegions {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborRegions {
    pub const COUNT: usize = 8;

    pub fn new() -> Self {
        let mut regions = Vec::with_capacity(Self::COUNT);
        for base in [&NEAR_UP[..], &FAR_UP[..]] {
            let mut current: Vec<(i32, i32)> = base.to_vec();
            for _ in 0..4 {
                regions.push(current.clone());
                current = current.into_iter().map(rotate).collect();
            }
        }
        Self { regions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &[(i32, i32)]> {
        self.regions.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_offset_reads_the_opposite_colour() {
        let regions = NeighborRegions::new();
        assert_eq!(regions.len(), NeighborRegions::COUNT);
        for region in regions.iter() {
            for &(dx, dy) in region {
                assert_eq!((dx + dy).rem_euclid(2), 1, "offset ({dx}, {dy})");
                let (x, y) = (40i32, 40i32);
                let here = Phase::of(x as usize, y as usize);
                let there = Phase::of((x + dx) as usize, (y + dy) as usize);
                assert_eq!(there, here.other());
            }
        }
    }

    #[test]
    fn regions_cover_four_directions() {
        let regions = NeighborRegions::new();
        let firsts: Vec<(i32, i32)> = regions.iter().map(|r| r[0]).collect();
        assert_eq!(
            &firsts[..4],
            &[(0, -1), (1, 0), (0, 1), (-1, 0)],
            "near regions rotate clockwise from up"
        );
        assert_eq!(&firsts[4..], &[(0, -3), (3, 0), (0, 3), (-3, 0)]);
    }

    #[test]
    fn phases_partition_the_grid() {
        for y in 0..5 {
            for x in 0..5 {
                let owners = Phase::ALL.iter().filter(|p| p.owns(x, y)).count();
                assert_eq!(owners, 1);
            }
        }
    }
}
