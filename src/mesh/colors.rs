//! Height-to-color mapping for terrain meshes

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RGBA color type
pub type TerrainColor = [f32; 4];

/// Trait for mapping normalized terrain heights to colors
pub trait ColorMapper {
    /// Map a height in `[0, 1]` (0 = lowest, 1 = `terrain_height`) to an RGBA color
    fn map_color(&self, normalized_height: f32) -> TerrainColor;
}

/// Piecewise-linear color gradient over normalized height
///
/// Stops are `(height, color)` pairs sorted by height; heights outside the
/// first/last stop clamp to the end colors.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGradient {
    stops: Vec<(f32, TerrainColor)>,
}

impl HeightGradient {
    /// Create a gradient from stops (sorted here, so order does not matter)
    pub fn new(mut stops: Vec<(f32, TerrainColor)>) -> Self {
        stops.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { stops }
    }

    /// Gradient stops, sorted by height
    pub fn stops(&self) -> &[(f32, TerrainColor)] {
        &self.stops
    }
}

impl Default for HeightGradient {
    fn default() -> Self {
        Self::new(vec![
            (0.0, [0.25, 0.45, 0.2, 1.0]),  // Lowland green
            (0.35, [0.35, 0.55, 0.25, 1.0]), // Grass
            (0.65, [0.45, 0.38, 0.28, 1.0]), // Dirt
            (0.85, [0.5, 0.5, 0.5, 1.0]),    // Rock
            (1.0, [0.95, 0.95, 1.0, 1.0]),   // Snow
        ])
    }
}

impl ColorMapper for HeightGradient {
    fn map_color(&self, normalized_height: f32) -> TerrainColor {
        let Some(&(first_height, first_color)) = self.stops.first() else {
            return [1.0, 1.0, 1.0, 1.0];
        };
        if normalized_height <= first_height {
            return first_color;
        }

        for pair in self.stops.windows(2) {
            let (h0, c0) = pair[0];
            let (h1, c1) = pair[1];
            if normalized_height <= h1 {
                let span = h1 - h0;
                let t = if span > f32::EPSILON {
                    (normalized_height - h0) / span
                } else {
                    1.0
                };
                return [
                    c0[0] + (c1[0] - c0[0]) * t,
                    c0[1] + (c1[1] - c0[1]) * t,
                    c0[2] + (c1[2] - c0[2]) * t,
                    c0[3] + (c1[3] - c0[3]) * t,
                ];
            }
        }

        self.stops[self.stops.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints_clamp() {
        let gradient = HeightGradient::default();
        assert_eq!(gradient.map_color(-1.0), gradient.stops()[0].1);
        assert_eq!(gradient.map_color(2.0), [0.95, 0.95, 1.0, 1.0]);
    }

    #[test]
    fn test_gradient_interpolates() {
        let gradient = HeightGradient::new(vec![
            (1.0, [1.0, 1.0, 1.0, 1.0]),
            (0.0, [0.0, 0.0, 0.0, 1.0]),
        ]);
        let mid = gradient.map_color(0.5);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        assert_eq!(mid[3], 1.0);
    }

    #[test]
    fn test_empty_gradient_is_white() {
        let gradient = HeightGradient::new(Vec::new());
        assert_eq!(gradient.map_color(0.3), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_custom_mapper() {
        struct Banded;
        impl ColorMapper for Banded {
            fn map_color(&self, h: f32) -> TerrainColor {
                if h < 0.5 {
                    [0.0, 0.0, 1.0, 1.0]
                } else {
                    [1.0, 1.0, 1.0, 1.0]
                }
            }
        }
        assert_eq!(Banded.map_color(0.1)[2], 1.0);
    }
}
