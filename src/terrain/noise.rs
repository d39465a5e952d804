//! 2D lattice value noise
//!
//! Random values are hashed at integer lattice points through the standard
//! Ken Perlin permutation table and blended with a quintic fade. Octaves are
//! accumulated as fractal Brownian motion.

/// Configuration for fractal value noise
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoiseConfig {
    /// Base frequency in lattice cells per world unit (lower = larger features)
    pub scale: f32,
    /// Number of octaves for fractal detail layers
    pub octaves: usize,
    /// Amplitude decay per octave (controls roughness)
    pub persistence: f32,
    /// Frequency multiplier per octave
    pub lacunarity: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            scale: 0.02,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

// Standard 256-element permutation table from Ken Perlin's reference implementation.
// Changing it changes every generated heightmap.
const PERM: [u32; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Lattice hash in `0..=255`, mixing the seed into both coordinates
#[inline]
fn hash(x: i32, z: i32, seed: u32) -> u32 {
    let seed_hash = seed.wrapping_mul(1103515245).wrapping_add(12345) >> 16;
    let ix = ((x as u32) ^ seed_hash) & 255;
    let iz = ((z as u32) ^ (seed_hash >> 8)) & 255;
    let a = PERM[ix as usize];
    PERM[((a + iz) & 255) as usize]
}

/// Quintic smoothstep: 6t⁵ - 15t⁴ + 10t³
#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Sample single-octave value noise in `[0, 1]`
pub fn value_noise_2d(x: f32, z: f32, seed: u32) -> f32 {
    let x0 = x.floor() as i32;
    let z0 = z.floor() as i32;

    let u = fade(x - x.floor());
    let v = fade(z - z.floor());

    let corner = |dx: i32, dz: i32| hash(x0 + dx, z0 + dz, seed) as f32 / 255.0;

    let near = lerp(corner(0, 0), corner(1, 0), u);
    let far = lerp(corner(0, 1), corner(1, 1), u);
    lerp(near, far, v)
}

/// Sample fractal value noise at a world XZ position
///
/// Each octave is remapped to `[-1, 1]` before being weighted, and the sum is
/// normalized back to `[0, 1]`. Zero octaves yield the midpoint `0.5`.
pub fn sample_fbm(x: f32, z: f32, seed: u32, config: &NoiseConfig) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = config.scale;
    let mut max_value = 0.0;

    for octave in 0..config.octaves {
        let sample = value_noise_2d(x * frequency, z * frequency, seed.wrapping_add(octave as u32));
        value += (sample * 2.0 - 1.0) * amplitude;
        max_value += amplitude;

        frequency *= config.lacunarity;
        amplitude *= config.persistence;
    }

    if max_value <= 0.0 {
        return 0.5;
    }
    (((value / max_value) + 1.0) * 0.5).clamp(0.0, 1.0)
}
