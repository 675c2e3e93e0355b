//! Row-major 2D grid used for every raster buffer in the pipeline.
//!
//! Occupancy masks are `Grid<f32>` holding alpha coverage in `[0, 1]`;
//! colored layers are `Grid<Rgba>` (see `composite`).
//! Edges never wrap: reads outside the grid are the caller's concern.

use rayon::prelude::*;
use std::ops::{Add, Mul};

/// Values that can be interpolated and blurred
pub trait Sample: Copy + Default + Send + Sync + Add<Output = Self> + Mul<f32, Output = Self> {}

impl<T> Sample for T where T: Copy + Default + Send + Sync + Add<Output = T> + Mul<f32, Output = T> {}

#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Signed lookup, `None` outside the grid
    pub fn try_get(&self, x: i64, y: i64) -> Option<&T> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.get(x as usize, y as usize))
    }

    pub fn same_size<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Apply `f` to every cell, producing a grid of the same size.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Combine two same-sized grids cell by cell. Returns `None` on a size mismatch.
    pub fn zip_map<U, V>(&self, other: &Grid<U>, f: impl Fn(&T, &U) -> V) -> Option<Grid<V>> {
        if !self.same_size(other) {
            return None;
        }
        Some(Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| f(a, b)).collect(),
        })
    }

    /// Copy shifted by `(dx, dy)` pixels; uncovered cells take `fill`.
    pub fn shifted(&self, dx: i64, dy: i64, fill: T) -> Grid<T> {
        let mut out = Grid::new_with(self.width, self.height, fill);
        for y in 0..self.height {
            let sy = y as i64 - dy;
            if sy < 0 || sy >= self.height as i64 {
                continue;
            }
            for x in 0..self.width {
                let sx = x as i64 - dx;
                if sx < 0 || sx >= self.width as i64 {
                    continue;
                }
                out.set(x, y, self.get(sx as usize, sy as usize).clone());
            }
        }
        out
    }
}

// =============================================================================
// SAMPLING AND FILTERING
// =============================================================================

impl<T: Sample> Grid<T> {
    /// Sample using bilinear interpolation with clamped edges.
    /// Coordinates address pixel centers at integer positions.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> T {
        if self.width == 0 || self.height == 0 {
            return T::default();
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let v00 = *self.get(x0, y0);
        let v10 = *self.get(x1, y0);
        let v01 = *self.get(x0, y1);
        let v11 = *self.get(x1, y1);

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        v0 * (1.0 - fy) + v1 * fy
    }

    /// Resample to a new size with bilinear interpolation (pixel-center aligned).
    pub fn resize_bilinear(&self, width: usize, height: usize) -> Grid<T> {
        let mut out = Grid::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        let sx = self.width as f32 / width.max(1) as f32;
        let sy = self.height as f32 / height.max(1) as f32;

        out.data
            .par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                let src_y = (y as f32 + 0.5) * sy - 0.5;
                for (x, cell) in row.iter_mut().enumerate() {
                    let src_x = (x as f32 + 0.5) * sx - 0.5;
                    *cell = self.sample_bilinear(src_x, src_y);
                }
            });
        out
    }

    /// Separable box blur with clamped edges. `radius == 0` is a copy.
    pub fn box_blur(&self, radius: usize) -> Grid<T> {
        if radius == 0 || self.width == 0 || self.height == 0 {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        let norm = 1.0 / (2 * radius + 1) as f32;

        let mut horizontal = vec![T::default(); w * h];
        horizontal
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    let mut acc = T::default();
                    for k in 0..=2 * radius {
                        let sx = (x + k).saturating_sub(radius).min(w - 1);
                        acc = acc + *self.get(sx, y);
                    }
                    *cell = acc * norm;
                }
            });

        let mut data = vec![T::default(); w * h];
        data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                let mut acc = T::default();
                for k in 0..=2 * radius {
                    let sy = (y + k).saturating_sub(radius).min(h - 1);
                    acc = acc + horizontal[sy * w + x];
                }
                *cell = acc * norm;
            }
        });

        Grid { width: w, height: h, data }
    }

    /// Area-average downsample so that neither side exceeds `max_side`.
    /// Returns the grid unchanged (cloned) when it already fits, plus the scale used.
    pub fn downsample_to(&self, max_side: usize) -> (Grid<T>, f32) {
        let longest = self.width.max(self.height);
        if longest <= max_side || max_side == 0 {
            return (self.clone(), 1.0);
        }
        let scale = max_side as f32 / longest as f32;
        let w = ((self.width as f32 * scale).ceil() as usize).max(1);
        let h = ((self.height as f32 * scale).ceil() as usize).max(1);
        let inv = 1.0 / scale;

        let mut out = Grid::new(w, h);
        out.data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let y0 = (y as f32 * inv).floor() as usize;
            let y1 = (((y + 1) as f32 * inv).ceil() as usize).min(self.height).max(y0 + 1);
            for (x, cell) in row.iter_mut().enumerate() {
                let x0 = (x as f32 * inv).floor() as usize;
                let x1 = (((x + 1) as f32 * inv).ceil() as usize).min(self.width).max(x0 + 1);
                let mut acc = T::default();
                let mut count = 0usize;
                for sy in y0..y1.min(self.height) {
                    for sx in x0..x1.min(self.width) {
                        acc = acc + *self.get(sx, sy);
                        count += 1;
                    }
                }
                if count > 0 {
                    *cell = acc * (1.0 / count as f32);
                }
            }
        });
        (out, scale)
    }
}

// =============================================================================
// MASK HELPERS
// =============================================================================

impl Grid<f32> {
    /// `1 - alpha` everywhere
    pub fn inverted(&self) -> Grid<f32> {
        self.map(|a| 1.0 - a.clamp(0.0, 1.0))
    }

    /// Number of cells with alpha above `threshold`
    pub fn count_above(&self, threshold: f32) -> usize {
        self.data.iter().filter(|&&a| a > threshold).count()
    }

    /// Pixel bounding box `(min_x, min_y, max_x, max_y)` of cells above `threshold`
    pub fn occupied_bounds(&self, threshold: f32) -> Option<(usize, usize, usize, usize)> {
        let mut result: Option<(usize, usize, usize, usize)> = None;
        for (x, y, &a) in self.iter() {
            if a <= threshold {
                continue;
            }
            result = Some(match result {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifted_fills_uncovered() {
        let mut g = Grid::new_with(3, 3, 0.0f32);
        g.set(0, 0, 1.0);
        let s = g.shifted(1, 2, 0.5);
        assert_eq!(*s.get(1, 2), 1.0);
        assert_eq!(*s.get(0, 0), 0.5);
        assert_eq!(*s.get(0, 2), 0.5);
    }

    #[test]
    fn test_box_blur_preserves_constant() {
        let g = Grid::new_with(8, 5, 0.75f32);
        let b = g.box_blur(2);
        for (_, _, &v) in b.iter() {
            assert!((v - 0.75).abs() < 1e-6);
        }
    }

    #[test]
    fn test_box_blur_spreads_impulse() {
        let mut g = Grid::new_with(9, 9, 0.0f32);
        g.set(4, 4, 1.0);
        let b = g.box_blur(1);
        assert!((*b.get(4, 4) - 1.0 / 9.0).abs() < 1e-6);
        assert!(*b.get(3, 3) > 0.0);
        assert_eq!(*b.get(0, 0), 0.0);
    }

    #[test]
    fn test_downsample_area_average() {
        let mut g = Grid::new_with(4, 4, 0.0f32);
        g.set(0, 0, 1.0);
        let (d, scale) = g.downsample_to(2);
        assert_eq!((d.width, d.height), (2, 2));
        assert!((scale - 0.5).abs() < 1e-6);
        assert!((*d.get(0, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_occupied_bounds() {
        let mut g = Grid::new_with(6, 4, 0.0f32);
        g.set(2, 1, 1.0);
        g.set(4, 3, 0.8);
        assert_eq!(g.occupied_bounds(0.5), Some((2, 1, 4, 3)));
        assert_eq!(Grid::new_with(2, 2, 0.0f32).occupied_bounds(0.5), None);
    }

    #[test]
    fn test_zip_map_size_mismatch() {
        let a = Grid::new_with(2, 2, 1.0f32);
        let b = Grid::new_with(3, 2, 1.0f32);
        assert!(a.zip_map(&b, |x, y| x * y).is_none());
    }
}
