//! Screen space tiles split into exponential depth slices, and the CPU side
//! assignment of lights to them.
//!
//! A cluster is addressed by tile column `x`, tile row `y` and depth slice `z`.
//! Tiles are [`COMPUTE_SHADER_TILE_GROUP_DIM`] pixels square, rows grow downwards
//! and depth slices grow away from the camera.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::util::frustum::{BoundingSphere, ShaderPlane};

/// Width and height of a screen tile in pixels. Also the compute workgroup size.
pub const COMPUTE_SHADER_TILE_GROUP_DIM: u32 = 16;
/// Number of depth slices every tile is split into.
pub const NUM_DEPTH_CLUSTERS: u32 = 64;
pub const DEPTH_CLUSTER_CALC_SCALE: f32 = 8.740867046;
pub const DEPTH_CLUSTER_CALC_BIAS: f32 = -20.29566477;

/// Depth slice containing a view space depth.
///
/// Depths in front of the first boundary, including non-positive ones, land in slice 0.
pub fn depth_cluster_id(linear_depth: f32) -> u32 {
    if linear_depth.is_nan() || linear_depth <= 0.0 {
        return 0;
    }
    let id = (linear_depth.log2() * DEPTH_CLUSTER_CALC_SCALE + DEPTH_CLUSTER_CALC_BIAS)
        .max(0.0)
        .floor();
    (id as u32).min(NUM_DEPTH_CLUSTERS - 1)
}

/// View space depth at which slice `id` begins. Inverse of [`depth_cluster_id`].
pub fn linear_depth_from_cluster_id(id: u32) -> f32 {
    2.0_f32.powf((id as f32 - DEPTH_CLUSTER_CALC_BIAS) / DEPTH_CLUSTER_CALC_SCALE)
}

/// Number of tile columns and rows needed to cover the given resolution.
pub fn tile_counts(width: u32, height: u32) -> (u32, u32) {
    (
        (width + COMPUTE_SHADER_TILE_GROUP_DIM - 1) / COMPUTE_SHADER_TILE_GROUP_DIM,
        (height + COMPUTE_SHADER_TILE_GROUP_DIM - 1) / COMPUTE_SHADER_TILE_GROUP_DIM,
    )
}

/// Boundary planes of every cluster, in view space.
///
/// All planes pass through the eye except the depth planes. Every plane's positive
/// side faces increasing tile column, row or slice index.
#[derive(Debug, Clone)]
pub struct ClusterPlanes {
    x_planes: Vec<ShaderPlane>,
    y_planes: Vec<ShaderPlane>,
    z_planes: Vec<ShaderPlane>,
    tiles_x: u32,
    tiles_y: u32,
    dirty: bool,
}

impl ClusterPlanes {
    pub fn new() -> Self {
        Self {
            x_planes: Vec::new(),
            y_planes: Vec::new(),
            z_planes: Vec::new(),
            tiles_x: 0,
            tiles_y: 0,
            dirty: true,
        }
    }

    /// Forces the next [`ClusterPlanes::update`] to rebuild. Call when the projection or resolution changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuilds the planes if they are dirty. Returns whether a rebuild happened.
    pub fn update(&mut self, projection: Mat4, width: u32, height: u32) -> bool {
        if !self.dirty {
            return false;
        }
        profiling::scope!("ClusterPlanes::update");

        let (tiles_x, tiles_y) = tile_counts(width, height);
        let scale_x = width as f32 / (2 * COMPUTE_SHADER_TILE_GROUP_DIM) as f32;
        let scale_y = height as f32 / (2 * COMPUTE_SHADER_TILE_GROUP_DIM) as f32;
        let p11 = projection.x_axis.x;
        let p22 = projection.y_axis.y;

        self.x_planes = (0..=tiles_x)
            .map(|i| ShaderPlane::new(p11 * scale_x, 0.0, scale_x - i as f32, 0.0).normalize())
            .collect();
        self.y_planes = (0..=tiles_y)
            .map(|j| ShaderPlane::new(0.0, -p22 * scale_y, scale_y - j as f32, 0.0).normalize())
            .collect();
        self.z_planes = (0..NUM_DEPTH_CLUSTERS)
            .map(|k| match k {
                0 => ShaderPlane::new(0.0, 0.0, 1.0, 0.0),
                _ => ShaderPlane::new(0.0, 0.0, 1.0, -linear_depth_from_cluster_id(k)),
            })
            .collect();

        self.tiles_x = tiles_x;
        self.tiles_y = tiles_y;
        self.dirty = false;

        log::debug!("Rebuilt cluster planes for {}x{} tiles", tiles_x, tiles_y);
        true
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn cluster_count(&self) -> usize {
        (self.tiles_x * self.tiles_y * NUM_DEPTH_CLUSTERS) as usize
    }

    pub fn x_planes(&self) -> &[ShaderPlane] {
        &self.x_planes
    }

    pub fn y_planes(&self) -> &[ShaderPlane] {
        &self.y_planes
    }

    pub fn z_planes(&self) -> &[ShaderPlane] {
        &self.z_planes
    }

    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> usize {
        ((z * self.tiles_y + y) * self.tiles_x + x) as usize
    }
}

impl Default for ClusterPlanes {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice of [`ClusterLightLists::indices`] belonging to one cluster.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ClusterRange {
    pub offset: u32,
    pub count: u32,
}

/// Lights touching each cluster, flattened for upload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterLightLists {
    pub grid: Vec<ClusterRange>,
    pub indices: Vec<u32>,
}

impl ClusterLightLists {
    pub fn lights_in(&self, cluster_index: usize) -> &[u32] {
        match self.grid.get(cluster_index) {
            Some(range) => &self.indices[range.offset as usize..(range.offset + range.count) as usize],
            None => &[],
        }
    }
}

/// Shrinks a sphere to its cross section with `plane`. `None` if it does not reach the plane.
fn project_onto_plane(plane: ShaderPlane, center: Vec3, radius: f32) -> Option<(Vec3, f32)> {
    let distance = plane.distance(center);
    if distance.abs() >= radius {
        return None;
    }
    Some((center - plane.abc * distance, (radius * radius - distance * distance).sqrt()))
}

/// Restricts a sphere to the slab between boundaries `index` and `index + 1`.
///
/// When the center already lies in the slab the sphere is unchanged, otherwise it
/// is shrunk onto the boundary nearest the center.
fn clip_to_slab(planes: &[ShaderPlane], index: usize, center: Vec3, radius: f32) -> Option<(Vec3, f32)> {
    let near = planes[index];
    if near.distance(center) < 0.0 {
        return project_onto_plane(near, center, radius);
    }
    match planes.get(index + 1) {
        Some(&far) if far.distance(center) > 0.0 => project_onto_plane(far, center, radius),
        _ => Some((center, radius)),
    }
}

/// Whether a sphere overlaps the slab between boundaries `index` and `index + 1`.
fn overlaps_slab(planes: &[ShaderPlane], index: usize, center: Vec3, radius: f32) -> bool {
    planes[index].distance(center) > -radius && planes[index + 1].distance(center) < radius
}

/// Builds per-cluster light lists from view space bounding spheres.
///
/// The index written for a light is its position in `lights`.
pub fn assign_lights(planes: &ClusterPlanes, lights: &[BoundingSphere]) -> ClusterLightLists {
    profiling::scope!("assign_lights");

    let cluster_count = planes.cluster_count();
    let mut pairs: Vec<(u32, u32)> = Vec::new();

    if cluster_count != 0 {
        for (light_index, sphere) in lights.iter().enumerate() {
            let (center, radius) = (sphere.center, sphere.radius);
            if radius <= 0.0 || center.z + radius <= 0.0 {
                continue;
            }

            let z_start = depth_cluster_id(center.z - radius);
            let z_end = depth_cluster_id(center.z + radius);

            for z in z_start..=z_end {
                let Some((z_center, z_radius)) = clip_to_slab(&planes.z_planes, z as usize, center, radius) else {
                    continue;
                };

                for y in 0..planes.tiles_y {
                    if !overlaps_slab(&planes.y_planes, y as usize, z_center, z_radius) {
                        continue;
                    }
                    let Some((y_center, y_radius)) = clip_to_slab(&planes.y_planes, y as usize, z_center, z_radius)
                    else {
                        continue;
                    };

                    for x in 0..planes.tiles_x {
                        if overlaps_slab(&planes.x_planes, x as usize, y_center, y_radius) {
                            pairs.push((planes.cluster_index(x, y, z) as u32, light_index as u32));
                        }
                    }
                }
            }
        }
    }

    let mut grid = vec![ClusterRange::default(); cluster_count];
    for &(cluster, _) in &pairs {
        grid[cluster as usize].count += 1;
    }
    let mut offset = 0;
    for range in &mut grid {
        range.offset = offset;
        offset += range.count;
    }

    let mut cursor: Vec<u32> = grid.iter().map(|r| r.offset).collect();
    let mut indices = vec![0; pairs.len()];
    for (cluster, light) in pairs {
        let slot = &mut cursor[cluster as usize];
        indices[*slot as usize] = light;
        *slot += 1;
    }

    ClusterLightLists { grid, indices }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;

    const WIDTH: u32 = 1280;
    const HEIGHT: u32 = 720;

    fn projection() -> Mat4 {
        // Reverse Z, far and near swapped.
        Mat4::perspective_lh(std::f32::consts::FRAC_PI_3, WIDTH as f32 / HEIGHT as f32, 1000.0, 0.5)
    }

    fn planes() -> ClusterPlanes {
        let mut planes = ClusterPlanes::new();
        assert!(planes.update(projection(), WIDTH, HEIGHT));
        planes
    }

    /// View space point that projects onto the given pixel at depth `z`.
    fn unproject(px: f32, py: f32, z: f32) -> Vec3 {
        let proj = projection();
        let ndc_x = px / WIDTH as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - py / HEIGHT as f32 * 2.0;
        Vec3::new(ndc_x * z / proj.x_axis.x, ndc_y * z / proj.y_axis.y, z)
    }

    #[test]
    fn depth_cluster_round_trip() {
        for k in 1..NUM_DEPTH_CLUSTERS {
            let boundary = linear_depth_from_cluster_id(k);
            assert_eq!(depth_cluster_id(boundary * (1.0 + 1e-4)), k, "just past boundary {k}");
            assert_eq!(depth_cluster_id(boundary * (1.0 - 1e-4)), k - 1, "just before boundary {k}");
        }
    }

    #[test]
    fn depth_cluster_edges() {
        assert_eq!(depth_cluster_id(0.0), 0);
        assert_eq!(depth_cluster_id(-3.0), 0);
        assert_eq!(depth_cluster_id(f32::NAN), 0);
        assert_eq!(depth_cluster_id(1.0), 0);
        assert_eq!(depth_cluster_id(1.0e9), NUM_DEPTH_CLUSTERS - 1);
        assert!((linear_depth_from_cluster_id(0) - 5.0).abs() < 1e-3);
    }

    #[test]
    fn tile_count_rounds_up() {
        assert_eq!(tile_counts(1280, 720), (80, 45));
        assert_eq!(tile_counts(1281, 721), (81, 46));
        assert_eq!(tile_counts(1, 1), (1, 1));
    }

    #[test]
    fn update_is_lazy() {
        let mut planes = planes();
        assert!(!planes.update(projection(), WIDTH, HEIGHT));
        assert!(!planes.is_dirty());

        planes.mark_dirty();
        assert!(planes.update(projection(), WIDTH, HEIGHT));
        assert!(!planes.update(projection(), WIDTH, HEIGHT));
    }

    #[test]
    fn plane_counts_and_normalization() {
        let planes = planes();
        assert_eq!(planes.x_planes().len(), 81);
        assert_eq!(planes.y_planes().len(), 46);
        assert_eq!(planes.z_planes().len(), NUM_DEPTH_CLUSTERS as usize);

        for plane in planes.x_planes().iter().chain(planes.y_planes()).chain(planes.z_planes()) {
            assert!((plane.abc.length() - 1.0).abs() < 1e-5);
        }
        assert_eq!(planes.z_planes()[0].d, 0.0);
        assert_eq!(planes.z_planes()[3].d, -linear_depth_from_cluster_id(3));
    }

    #[test]
    fn planes_face_increasing_tiles() {
        let planes = planes();
        for (i, j) in [(0, 0), (13, 7), (40, 22), (79, 44)] {
            let point = unproject(
                (i * COMPUTE_SHADER_TILE_GROUP_DIM) as f32 + 8.0,
                (j * COMPUTE_SHADER_TILE_GROUP_DIM) as f32 + 8.0,
                25.0,
            );
            let (i, j) = (i as usize, j as usize);
            assert!(planes.x_planes()[i].distance(point) > 0.0);
            assert!(planes.x_planes()[i + 1].distance(point) < 0.0);
            assert!(planes.y_planes()[j].distance(point) > 0.0);
            assert!(planes.y_planes()[j + 1].distance(point) < 0.0);
        }

        let z = linear_depth_from_cluster_id(10) + 0.1;
        let point = Vec3::new(0.0, 0.0, z);
        assert!(planes.z_planes()[10].distance(point) > 0.0);
        assert!(planes.z_planes()[11].distance(point) < 0.0);
    }

    #[test]
    fn small_light_lands_in_its_cluster() {
        let planes = planes();
        let center = unproject(200.0, 100.0, 40.0);
        let lists = assign_lights(&planes, &[BoundingSphere::new(center, 0.01)]);

        let (x, y, z) = (200 / 16, 100 / 16, depth_cluster_id(40.0));
        let index = planes.cluster_index(x, y, z);
        assert_eq!(lists.lights_in(index), &[0]);
        assert_eq!(lists.indices.len(), 1);
        assert_eq!(lists.grid.len(), planes.cluster_count());
    }

    #[test]
    fn light_behind_camera_is_skipped() {
        let planes = planes();
        let lists = assign_lights(&planes, &[BoundingSphere::new(Vec3::new(0.0, 0.0, -20.0), 5.0)]);
        assert!(lists.indices.is_empty());
        assert!(lists.grid.iter().all(|r| r.count == 0));
    }

    #[test]
    fn lights_are_listed_per_cluster() {
        let planes = planes();
        let near = BoundingSphere::new(unproject(640.0, 360.0, 20.0), 1.0);
        let far = BoundingSphere::new(unproject(640.0, 360.0, 300.0), 1.0);
        let lists = assign_lights(&planes, &[near, far]);

        let near_cluster = planes.cluster_index(40, 22, depth_cluster_id(20.0));
        let far_cluster = planes.cluster_index(40, 22, depth_cluster_id(300.0));
        assert_eq!(lists.lights_in(near_cluster), &[0]);
        assert_eq!(lists.lights_in(far_cluster), &[1]);

        // Every listed index is valid and ranges tile the index array exactly.
        let total: u32 = lists.grid.iter().map(|r| r.count).sum();
        assert_eq!(total as usize, lists.indices.len());
        assert!(lists.indices.iter().all(|&i| i < 2));
    }

    #[test]
    fn large_light_covers_whole_screen_slice() {
        let planes = planes();
        let lists = assign_lights(&planes, &[BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 10_000.0)]);
        for y in 0..planes.tiles_y() {
            for x in 0..planes.tiles_x() {
                assert_eq!(lists.lights_in(planes.cluster_index(x, y, 5)), &[0]);
            }
        }
    }
}
