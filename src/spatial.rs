//! Fixed-grid spatial bucket index.
//!
//! A flat `RX × RY` grid of cells, each a sorted fixed-capacity array of
//! entity ids. Coordinates live in component data; the grid stores ids only.
//! Overlap-style systems insert each entity into every cell its region covers
//! and query a region through [`iter`](SpatialGrid::iter), which merges the
//! covered cells into a strictly increasing candidate sequence.

use arrayvec::ArrayVec;

use crate::config;
use crate::entity::Id;
use crate::error::Error;

/// A half-open rectangle of grid cells: `x ∈ [min_x, max_x)`, `y ∈ [min_y, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min_x: u8,
    pub min_y: u8,
    pub max_x: u8,
    pub max_y: u8,
}

impl Region {
    /// Cell count along x.
    pub fn size_x(&self) -> usize { usize::from(self.max_x) - usize::from(self.min_x) }

    /// Cell count along y.
    pub fn size_y(&self) -> usize { usize::from(self.max_y) - usize::from(self.min_y) }

    /// Number of covered cells.
    pub fn area(&self) -> usize { self.size_x() * self.size_y() }

    /// Whether the rectangle is non-empty.
    pub fn is_valid(&self) -> bool { self.min_x < self.max_x && self.min_y < self.max_y }

    /// Row-major index of a covered cell within the region.
    pub fn index(&self, x: u8, y: u8) -> usize {
        debug_assert!(x >= self.min_x && x < self.max_x);
        debug_assert!(y >= self.min_y && y < self.max_y);
        usize::from(x - self.min_x) * self.size_y() + usize::from(y - self.min_y)
    }
}

fn axis_span(min: f32, max: f32, cell_size: f32, bound: usize) -> (u8, u8) {
    let low = ((min / cell_size).floor().max(0.0) as usize).min(bound - 1);
    let high = (((max / cell_size).floor().max(0.0) as usize) + 1).clamp(low + 1, bound);
    (low as u8, high as u8)
}

/// Fixed-resolution grid of sorted id buckets.
pub struct SpatialGrid<const RX: usize = 64, const RY: usize = 64, const CAP: usize = 16> {
    cells: Box<[ArrayVec<Id, CAP>]>,
}

impl<const RX: usize, const RY: usize, const CAP: usize> Default for SpatialGrid<RX, RY, CAP> {
    fn default() -> Self { Self { cells: (0..RX * RY).map(|_| ArrayVec::new()).collect() } }
}

impl<const RX: usize, const RY: usize, const CAP: usize> SpatialGrid<RX, RY, CAP> {
    /// Creates an empty grid.
    pub fn new() -> Self { Self::default() }

    fn cell_index(x: u8, y: u8) -> usize { usize::from(x) * RY + usize::from(y) }

    fn check_region(region: Region) {
        debug_assert!(
            region.is_valid()
                && usize::from(region.max_x) <= RX
                && usize::from(region.max_y) <= RY,
            "region {region:?} outside a {RX}x{RY} grid",
        );
    }

    /// Maps a world-space rectangle onto covered cells, clamped to the grid.
    ///
    /// Cells are [`CELL_PIXEL_SIZE`](config::CELL_PIXEL_SIZE) world units on
    /// each side; see [`region_with_cell_size`](Self::region_with_cell_size)
    /// to override the scale.
    pub fn region(&self, min: (f32, f32), max: (f32, f32)) -> Region {
        self.region_with_cell_size(min, max, config::CELL_PIXEL_SIZE)
    }

    /// [`region`](Self::region) with an explicit cell edge length.
    pub fn region_with_cell_size(
        &self,
        min: (f32, f32),
        max: (f32, f32),
        cell_size: f32,
    ) -> Region {
        let (min_x, max_x) = axis_span(min.0, max.0, cell_size, RX);
        let (min_y, max_y) = axis_span(min.1, max.1, cell_size, RY);
        Region { min_x, min_y, max_x, max_y }
    }

    /// Inserts `id` into every covered cell, keeping cells sorted.
    ///
    /// Cells already containing `id` are left as-is. Fails without modifying
    /// the grid when any covered cell lacks space.
    pub fn insert(&mut self, id: Id, region: Region) -> Result<(), Error> {
        Self::check_region(region);
        debug_assert!(id.is_valid());

        for x in region.min_x..region.max_x {
            for y in region.min_y..region.max_y {
                let cell = &self.cells[Self::cell_index(x, y)];
                if cell.binary_search(&id).is_err() && cell.is_full() {
                    return Err(Error::CellCapacity);
                }
            }
        }
        for x in region.min_x..region.max_x {
            for y in region.min_y..region.max_y {
                let cell = &mut self.cells[Self::cell_index(x, y)];
                if let Err(pos) = cell.binary_search(&id) {
                    cell.insert(pos, id);
                }
            }
        }
        Ok(())
    }

    /// Deletes `id` from every covered cell.
    pub fn remove(&mut self, id: Id, region: Region) {
        Self::check_region(region);
        for x in region.min_x..region.max_x {
            for y in region.min_y..region.max_y {
                let cell = &mut self.cells[Self::cell_index(x, y)];
                match cell.binary_search(&id) {
                    Ok(pos) => {
                        cell.remove(pos);
                    }
                    Err(_) => debug_assert!(false, "id {id:?} absent from a covered cell"),
                }
            }
        }
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        for cell in self.cells.iter_mut() {
            cell.clear();
        }
    }

    /// Merges the covered cells into a strictly increasing sequence of
    /// distinct ids greater than `lower_bound`, built eagerly into `scratch`.
    ///
    /// Pass [`Id::INVALID`] for an unbounded query; pass the querying entity's
    /// own id to drop self-pairs and pairs already processed (each unordered
    /// pair `(a, b)` then surfaces exactly once, from the smaller side).
    pub fn iter<'t>(&self, lower_bound: Id, region: Region, scratch: &'t mut Vec<Id>) -> Iter<'t> {
        Self::check_region(region);
        scratch.clear();

        // one cursor per covered cell, advanced as its smallest entry is taken
        let mut cursors = vec![0_usize; region.area()];
        let mut previous = lower_bound;
        loop {
            let mut best: Option<(Id, usize)> = None;
            for x in region.min_x..region.max_x {
                for y in region.min_y..region.max_y {
                    let cell = &self.cells[Self::cell_index(x, y)];
                    let slot = region.index(x, y);
                    let mut cursor = cursors[slot];
                    while cursor < cell.len() && cell[cursor] <= previous {
                        cursor += 1;
                    }
                    cursors[slot] = cursor;
                    if cursor < cell.len() {
                        let candidate = cell[cursor];
                        if best.map_or(true, |(id, _)| candidate < id) {
                            best = Some((candidate, slot));
                        }
                    }
                }
            }
            match best {
                Some((id, slot)) => {
                    scratch.push(id);
                    previous = id;
                    cursors[slot] += 1;
                }
                None => break,
            }
        }

        Iter { inner: scratch.iter() }
    }

    /// Total number of id entries across all cells (ids covering several cells
    /// count once per cell).
    pub fn entry_count(&self) -> usize { self.cells.iter().map(ArrayVec::len).sum() }
}

/// Iterator over a merged region query; see [`SpatialGrid::iter`].
pub struct Iter<'t> {
    inner: std::slice::Iter<'t, Id>,
}

impl<'t> Iterator for Iter<'t> {
    type Item = Id;

    fn next(&mut self) -> Option<Id> { self.inner.next().copied() }
}
