//! Regular elevation grid over the XZ plane

use glam::{Vec2, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Grid of height samples
///
/// Sample `(x, z)` sits at `origin + (x, z) * cell_size` in world XZ.
/// Heights are stored row-major: `heights[z * width + x]`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: usize,
    depth: usize,
    cell_size: f32,
    origin: Vec2,
    heights: Vec<f32>,
}

impl Heightmap {
    /// Create a flat heightmap of `width * depth` samples
    pub fn new(width: usize, depth: usize, cell_size: f32, origin: Vec2) -> Self {
        Self {
            width,
            depth,
            cell_size,
            origin,
            heights: vec![0.0; width * depth],
        }
    }

    /// Number of samples along X
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of samples along Z
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Spacing between neighbouring samples in world units
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World XZ position of sample `(0, 0)`
    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Raw row-major heights
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// World XZ extent covered by the grid
    pub fn extent(&self) -> Vec2 {
        Vec2::new(
            self.width.saturating_sub(1) as f32,
            self.depth.saturating_sub(1) as f32,
        ) * self.cell_size
    }

    /// Check if the grid holds no samples
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    #[inline]
    fn index(&self, x: usize, z: usize) -> Option<usize> {
        (x < self.width && z < self.depth).then(|| z * self.width + x)
    }

    /// Height of sample `(x, z)`
    pub fn get(&self, x: usize, z: usize) -> Option<f32> {
        self.index(x, z).map(|i| self.heights[i])
    }

    /// Set the height of sample `(x, z)`; out-of-range writes are ignored
    pub fn set(&mut self, x: usize, z: usize, height: f32) {
        if let Some(i) = self.index(x, z) {
            self.heights[i] = height;
        }
    }

    /// World XZ position of sample `(x, z)`
    pub fn cell_center(&self, x: usize, z: usize) -> Vec2 {
        self.origin + Vec2::new(x as f32, z as f32) * self.cell_size
    }

    /// World position of sample `(x, z)` including its height
    pub fn sample_position(&self, x: usize, z: usize) -> Vec3 {
        let xz = self.cell_center(x, z);
        Vec3::new(xz.x, self.get(x, z).unwrap_or(0.0), xz.y)
    }

    /// Sample nearest to a world position, if it falls on the grid
    pub fn cell_at(&self, world: Vec3) -> Option<(usize, usize)> {
        if self.is_empty() || self.cell_size <= 0.0 {
            return None;
        }
        let gx = ((world.x - self.origin.x) / self.cell_size).round();
        let gz = ((world.z - self.origin.y) / self.cell_size).round();
        if gx < 0.0 || gz < 0.0 {
            return None;
        }
        let (x, z) = (gx as usize, gz as usize);
        self.index(x, z).map(|_| (x, z))
    }

    /// Bilinearly interpolated height at a world XZ position
    ///
    /// Positions outside the grid clamp to the border samples.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        if self.is_empty() || self.cell_size <= 0.0 {
            return 0.0;
        }

        let max_x = self.width.saturating_sub(1) as f32;
        let max_z = self.depth.saturating_sub(1) as f32;
        let gx = ((x - self.origin.x) / self.cell_size).clamp(0.0, max_x);
        let gz = ((z - self.origin.y) / self.cell_size).clamp(0.0, max_z);

        let x0 = gx.floor() as usize;
        let z0 = gz.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let z1 = (z0 + 1).min(self.depth - 1);
        let fx = gx - x0 as f32;
        let fz = gz - z0 as f32;

        let h00 = self.heights[z0 * self.width + x0];
        let h10 = self.heights[z0 * self.width + x1];
        let h01 = self.heights[z1 * self.width + x0];
        let h11 = self.heights[z1 * self.width + x1];

        let near = h00 * (1.0 - fx) + h10 * fx;
        let far = h01 * (1.0 - fx) + h11 * fx;
        near * (1.0 - fz) + far * fz
    }

    /// Lowest stored height (0 for an empty grid)
    pub fn min_height(&self) -> f32 {
        self.heights.iter().copied().reduce(f32::min).unwrap_or(0.0)
    }

    /// Highest stored height (0 for an empty grid)
    pub fn max_height(&self) -> f32 {
        self.heights.iter().copied().reduce(f32::max).unwrap_or(0.0)
    }
}
