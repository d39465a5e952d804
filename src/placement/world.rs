//! Collision world seam
//!
//! Placement never owns physics. It asks a [`PhysicsWorld`] for ground rays
//! and box overlaps and registers what it places there, so later queries in
//! the same pass see earlier buildings. [`CollisionWorld`] is a standalone
//! implementation on top of parry3d for tools, tests and headless runs.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::na::{Quaternion, Translation3, UnitQuaternion};
use parry3d::query::{self, Ray, RayCast};
use parry3d::shape::{Cuboid, Triangle};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::BuildingPrefab;
use crate::mesh::MeshData;

/// Bit set of collision layers
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    /// Terrain and other walkable ground
    pub const GROUND: LayerMask = LayerMask(1);
    /// Road surfaces
    pub const ROAD: LayerMask = LayerMask(1 << 1);
    /// Placed buildings
    pub const BUILDING: LayerMask = LayerMask(1 << 2);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub const fn from_bits(bits: u32) -> Self {
        LayerMask(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when the masks share at least one layer
    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every layer of `other` is in `self`
    pub const fn contains(self, other: LayerMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Layers of `self` that are not in `other`
    pub const fn without(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 & !other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitAnd for LayerMask {
    type Output = LayerMask;

    fn bitand(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 & rhs.0)
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayerMask {
    fn bitor_assign(&mut self, rhs: LayerMask) {
        self.0 |= rhs.0;
    }
}

/// Opaque handle of an object registered with a [`PhysicsWorld`]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u64);

/// Result of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Synchronous collision queries and object registration offered by the host
///
/// Queries must reflect every object instantiated so far.
pub trait PhysicsWorld {
    /// Closest hit along `direction` (unit length) within `max_distance`
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<RayHit>;

    /// Handles of every object on `layers` touching the oriented box
    fn overlap_box(
        &self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        layers: LayerMask,
    ) -> Vec<ColliderHandle>;

    /// Place a building whose base center sits at `position`
    fn instantiate(
        &mut self,
        prefab: &BuildingPrefab,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> ColliderHandle;

    /// Remove an object; unknown handles are ignored
    fn despawn(&mut self, handle: ColliderHandle);

    /// Register a triangle mesh as a static collidable surface
    fn add_surface(&mut self, mesh: &MeshData, layer: LayerMask) -> ColliderHandle;
}

/// Axis-aligned box used to skip exact shape tests
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Vec3,
    max: Vec3,
}

impl Bounds {
    fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(
            Bounds {
                min: Vec3::splat(f32::INFINITY),
                max: Vec3::splat(f32::NEG_INFINITY),
            },
            |b, p| Bounds {
                min: b.min.min(p),
                max: b.max.max(p),
            },
        )
    }

    fn of_box(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        let axes = [
            rotation * Vec3::X * half_extents.x,
            rotation * Vec3::Y * half_extents.y,
            rotation * Vec3::Z * half_extents.z,
        ];
        let reach = axes[0].abs() + axes[1].abs() + axes[2].abs();
        Bounds {
            min: center - reach,
            max: center + reach,
        }
    }

    fn intersects(&self, other: &Bounds) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

#[derive(Debug, Clone)]
struct SurfaceTriangle {
    shape: Triangle,
    bounds: Bounds,
}

#[derive(Debug, Clone)]
enum ColliderShape {
    Box {
        shape: Cuboid,
        pose: Isometry<Real>,
    },
    Surface {
        triangles: Vec<SurfaceTriangle>,
    },
}

#[derive(Debug, Clone)]
struct Collider {
    layer: LayerMask,
    bounds: Bounds,
    shape: ColliderShape,
    label: String,
}

/// parry3d-backed [`PhysicsWorld`]
///
/// Buildings are cuboids, surfaces are triangle soups. Handles are never
/// reused, so a stale handle can not alias a newer object.
#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    colliders: Vec<Option<Collider>>,
}

fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

fn to_pose(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ));
    Isometry::from_parts(Translation3::new(position.x, position.y, position.z), rotation)
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.colliders.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live objects on any of `layers`
    pub fn count_on(&self, layers: LayerMask) -> usize {
        self.colliders
            .iter()
            .flatten()
            .filter(|c| c.layer.intersects(layers))
            .count()
    }

    /// Prefab name or surface label of a live object
    pub fn label(&self, handle: ColliderHandle) -> Option<&str> {
        self.get(handle).map(|c| c.label.as_str())
    }

    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Add a flat rectangular ground surface spanning `min..max` in XZ at `height`
    pub fn add_ground_plane(&mut self, min: Vec3, max: Vec3, height: f32) -> ColliderHandle {
        let mesh = MeshData {
            positions: vec![
                [min.x, height, min.z],
                [max.x, height, min.z],
                [min.x, height, max.z],
                [max.x, height, max.z],
            ],
            normals: vec![[0.0, 1.0, 0.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            colors: Vec::new(),
            indices: vec![0, 2, 1, 1, 2, 3],
        };
        self.add_surface(&mesh, LayerMask::GROUND)
    }

    fn get(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle.0 as usize).and_then(|c| c.as_ref())
    }

    fn insert(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.push(Some(collider));
        ColliderHandle((self.colliders.len() - 1) as u64)
    }

    fn live(&self, layers: LayerMask) -> impl Iterator<Item = (ColliderHandle, &Collider)> + '_ {
        self.colliders
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ColliderHandle(i as u64), c)))
            .filter(move |(_, c)| c.layer.intersects(layers))
    }
}

/// Distance and normal of a ray hit against one shape
fn ray_hit<S: RayCast>(shape: &S, pose: &Isometry<Real>, ray: &Ray, max_distance: f32) -> Option<(f32, Vec3)> {
    let distance = shape.cast_ray(pose, ray, max_distance, true)?;
    let normal = shape
        .cast_ray_and_get_normal(pose, ray, max_distance, true)
        .map(|hit| Vec3::new(hit.normal.x, hit.normal.y, hit.normal.z))
        .unwrap_or(Vec3::Y);
    Some((distance, normal))
}

impl PhysicsWorld for CollisionWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }
        let ray = Ray::new(to_point(origin), Vector::new(direction.x, direction.y, direction.z));
        let ray_bounds = Bounds::from_points([origin, origin + direction * max_distance]);
        let identity = Isometry::identity();

        let mut best: Option<(f32, Vec3)> = None;
        let mut consider = |hit: Option<(f32, Vec3)>| {
            if let Some((distance, normal)) = hit {
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, normal));
                }
            }
        };

        for (_, collider) in self.live(layers) {
            if !collider.bounds.intersects(&ray_bounds) {
                continue;
            }
            match &collider.shape {
                ColliderShape::Box { shape, pose } => consider(ray_hit(shape, pose, &ray, max_distance)),
                ColliderShape::Surface { triangles } => {
                    for tri in triangles.iter().filter(|t| t.bounds.intersects(&ray_bounds)) {
                        consider(ray_hit(&tri.shape, &identity, &ray, max_distance));
                    }
                }
            }
        }

        best.map(|(distance, normal)| RayHit {
            point: origin + direction * distance,
            normal,
            distance,
        })
    }

    fn overlap_box(
        &self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        layers: LayerMask,
    ) -> Vec<ColliderHandle> {
        let query_shape = Cuboid::new(Vector::new(half_extents.x, half_extents.y, half_extents.z));
        let query_pose = to_pose(center, rotation);
        let query_bounds = Bounds::of_box(center, half_extents, rotation);
        let identity = Isometry::identity();

        // Unsupported shape pairs count as no contact
        let touches = |pose: &Isometry<Real>, shape: &dyn parry3d::shape::Shape| {
            query::intersection_test(&query_pose, &query_shape, pose, shape).unwrap_or(false)
        };

        self.live(layers)
            .filter(|(_, collider)| collider.bounds.intersects(&query_bounds))
            .filter(|(_, collider)| match &collider.shape {
                ColliderShape::Box { shape, pose } => touches(pose, shape),
                ColliderShape::Surface { triangles } => triangles
                    .iter()
                    .filter(|t| t.bounds.intersects(&query_bounds))
                    .any(|t| touches(&identity, &t.shape)),
            })
            .map(|(handle, _)| handle)
            .collect()
    }

    fn instantiate(
        &mut self,
        prefab: &BuildingPrefab,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> ColliderHandle {
        let half_extents = (prefab.size * scale).abs() * 0.5;
        let center = position + Vec3::Y * half_extents.y;
        let collider = Collider {
            layer: LayerMask::BUILDING,
            bounds: Bounds::of_box(center, half_extents, rotation),
            shape: ColliderShape::Box {
                shape: Cuboid::new(Vector::new(half_extents.x, half_extents.y, half_extents.z)),
                pose: to_pose(center, rotation),
            },
            label: prefab.name.clone(),
        };
        self.insert(collider)
    }

    fn despawn(&mut self, handle: ColliderHandle) {
        if let Some(slot) = self.colliders.get_mut(handle.0 as usize) {
            *slot = None;
        }
    }

    fn add_surface(&mut self, mesh: &MeshData, layer: LayerMask) -> ColliderHandle {
        let triangles: Vec<SurfaceTriangle> = mesh
            .triangles()
            .map(|[a, b, c]| SurfaceTriangle {
                shape: Triangle::new(to_point(a), to_point(b), to_point(c)),
                bounds: Bounds::from_points([a, b, c]),
            })
            .collect();
        let bounds = Bounds::from_points(mesh.positions.iter().map(|p| Vec3::from(*p)));

        self.insert(Collider {
            layer,
            bounds,
            shape: ColliderShape::Surface { triangles },
            label: format!("surface:{}", layer.bits()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefab(size: Vec3) -> BuildingPrefab {
        BuildingPrefab::new("house", size, 1.0)
    }

    fn ground() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.add_ground_plane(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(50.0, 0.0, 50.0), 2.0);
        world
    }

    #[test]
    fn test_layer_mask_ops() {
        let mask = LayerMask::GROUND | LayerMask::ROAD;
        assert!(mask.intersects(LayerMask::ROAD));
        assert!(!mask.intersects(LayerMask::BUILDING));
        assert!(mask.contains(LayerMask::GROUND));
        assert!(!LayerMask::GROUND.contains(mask));
        assert_eq!(LayerMask::from_bits(mask.bits()), mask);
        assert_eq!(mask & LayerMask::ROAD, LayerMask::ROAD);
        assert_eq!(mask.without(LayerMask::ROAD), LayerMask::GROUND);
        assert!(mask.without(mask).is_empty());
    }

    #[test]
    fn test_ray_hits_ground() {
        let world = ground();
        let hit = world
            .cast_ray(Vec3::new(3.0, 20.0, -4.0), Vec3::NEG_Y, 100.0, LayerMask::GROUND)
            .expect("ground below");
        assert!((hit.point.y - 2.0).abs() < 1e-4);
        assert!((hit.distance - 18.0).abs() < 1e-4);
        assert!(hit.normal.y.abs() > 0.99);
    }

    #[test]
    fn test_ray_respects_layers_and_range() {
        let world = ground();
        assert!(world
            .cast_ray(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y, 100.0, LayerMask::ROAD)
            .is_none());
        assert!(world
            .cast_ray(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y, 10.0, LayerMask::GROUND)
            .is_none());
        assert!(world
            .cast_ray(Vec3::new(80.0, 20.0, 0.0), Vec3::NEG_Y, 100.0, LayerMask::GROUND)
            .is_none());
    }

    #[test]
    fn test_ray_returns_closest_hit() {
        let mut world = ground();
        world.instantiate(&prefab(Vec3::new(4.0, 6.0, 4.0)), Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, Vec3::ONE);
        let hit = world
            .cast_ray(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y, 100.0, LayerMask::ALL)
            .unwrap();
        assert!((hit.point.y - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_overlap_finds_buildings() {
        let mut world = CollisionWorld::new();
        let handle = world.instantiate(&prefab(Vec3::new(4.0, 6.0, 4.0)), Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);

        let hits = world.overlap_box(Vec3::new(3.0, 3.0, 0.0), Vec3::splat(1.5), Quat::IDENTITY, LayerMask::BUILDING);
        assert_eq!(hits, vec![handle]);

        let miss = world.overlap_box(Vec3::new(6.0, 3.0, 0.0), Vec3::splat(1.5), Quat::IDENTITY, LayerMask::BUILDING);
        assert!(miss.is_empty());

        let other_layer = world.overlap_box(Vec3::new(3.0, 3.0, 0.0), Vec3::splat(1.5), Quat::IDENTITY, LayerMask::ROAD);
        assert!(other_layer.is_empty());
    }

    #[test]
    fn test_overlap_respects_rotation() {
        let mut world = CollisionWorld::new();
        // Long thin building along X
        world.instantiate(&prefab(Vec3::new(20.0, 4.0, 2.0)), Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        let point = Vec3::new(0.0, 2.0, 6.0);
        assert!(world.overlap_box(point, Vec3::splat(0.5), Quat::IDENTITY, LayerMask::ALL).is_empty());

        let mut turned = CollisionWorld::new();
        turned.instantiate(
            &prefab(Vec3::new(20.0, 4.0, 2.0)),
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        assert_eq!(turned.overlap_box(point, Vec3::splat(0.5), Quat::IDENTITY, LayerMask::ALL).len(), 1);
    }

    #[test]
    fn test_overlap_hits_surface() {
        let world = ground();
        let hits = world.overlap_box(Vec3::new(0.0, 2.0, 0.0), Vec3::splat(1.0), Quat::IDENTITY, LayerMask::GROUND);
        assert_eq!(hits.len(), 1);
        let above = world.overlap_box(Vec3::new(0.0, 5.0, 0.0), Vec3::splat(1.0), Quat::IDENTITY, LayerMask::GROUND);
        assert!(above.is_empty());
    }

    #[test]
    fn test_despawn_removes_and_handles_are_not_reused() {
        let mut world = CollisionWorld::new();
        let first = world.instantiate(&prefab(Vec3::ONE), Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        world.despawn(first);
        assert!(!world.contains(first));
        assert!(world.is_empty());

        let second = world.instantiate(&prefab(Vec3::ONE), Vec3::ZERO, Quat::IDENTITY, Vec3::ONE);
        assert_ne!(first, second);
        assert_eq!(world.label(second), Some("house"));
        world.despawn(ColliderHandle(999));
        assert_eq!(world.count_on(LayerMask::BUILDING), 1);
    }
}
