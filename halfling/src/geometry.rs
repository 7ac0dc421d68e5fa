//! Procedural meshes for the shapes a scene can request by type.
//!
//! Left handed, +Y up, clockwise front faces.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use halfling_types::{Aabb, Vertex};

/// CPU side mesh, ready to be uploaded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }
}

/// Flat grid in the XZ plane centered on the origin.
///
/// `x_vertices` and `z_vertices` are clamped to at least 2. Texture coordinates run
/// from 0 to the tiling factor along each axis.
pub fn create_grid(width: f32, depth: f32, x_vertices: u32, z_vertices: u32, x_tiling: f32, z_tiling: f32) -> MeshData {
    let n = x_vertices.max(2);
    let m = z_vertices.max(2);

    let half_width = 0.5 * width;
    let half_depth = 0.5 * depth;
    let dx = width / (n - 1) as f32;
    let dz = depth / (m - 1) as f32;
    let du = x_tiling / (n - 1) as f32;
    let dv = z_tiling / (m - 1) as f32;

    let mut vertices = Vec::with_capacity((m * n) as usize);
    for i in 0..m {
        let z = half_depth - i as f32 * dz;
        for j in 0..n {
            let x = -half_width + j as f32 * dx;
            vertices.push(Vertex::new(
                Vec3::new(x, 0.0, z),
                Vec3::Y,
                [j as f32 * du, i as f32 * dv],
                Vec3::X,
            ));
        }
    }

    let mut indices = Vec::with_capacity(((m - 1) * (n - 1) * 6) as usize);
    for i in 0..m - 1 {
        for j in 0..n - 1 {
            indices.extend_from_slice(&[
                i * n + j,
                i * n + j + 1,
                (i + 1) * n + j,
                (i + 1) * n + j,
                i * n + j + 1,
                (i + 1) * n + j + 1,
            ]);
        }
    }

    MeshData { vertices, indices }
}

/// Axis aligned box centered on the origin, four unshared vertices per face.
pub fn create_box(width: f32, height: f32, depth: f32) -> MeshData {
    let (w, h, d) = (0.5 * width, 0.5 * height, 0.5 * depth);

    // normal, tangent, then the four corners from bottom left clockwise, seen from outside.
    let faces: [(Vec3, Vec3, [Vec3; 4]); 6] = [
        (
            Vec3::NEG_Z,
            Vec3::X,
            [Vec3::new(-w, -h, -d), Vec3::new(-w, h, -d), Vec3::new(w, h, -d), Vec3::new(w, -h, -d)],
        ),
        (
            Vec3::Z,
            Vec3::NEG_X,
            [Vec3::new(w, -h, d), Vec3::new(w, h, d), Vec3::new(-w, h, d), Vec3::new(-w, -h, d)],
        ),
        (
            Vec3::Y,
            Vec3::X,
            [Vec3::new(-w, h, -d), Vec3::new(-w, h, d), Vec3::new(w, h, d), Vec3::new(w, h, -d)],
        ),
        (
            Vec3::NEG_Y,
            Vec3::NEG_X,
            [Vec3::new(w, -h, -d), Vec3::new(w, -h, d), Vec3::new(-w, -h, d), Vec3::new(-w, -h, -d)],
        ),
        (
            Vec3::NEG_X,
            Vec3::NEG_Z,
            [Vec3::new(-w, -h, d), Vec3::new(-w, h, d), Vec3::new(-w, h, -d), Vec3::new(-w, -h, -d)],
        ),
        (
            Vec3::X,
            Vec3::Z,
            [Vec3::new(w, -h, -d), Vec3::new(w, h, -d), Vec3::new(w, h, d), Vec3::new(w, -h, d)],
        ),
    ];
    let uvs = [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];

    let mut mesh = MeshData::default();
    for (normal, tangent, corners) in faces {
        let base = mesh.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            mesh.vertices.push(Vertex::new(corner, normal, uv, tangent));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// UV sphere centered on the origin. `slice_count` is clamped to at least 3, `stack_count` to at least 2.
pub fn create_sphere(radius: f32, slice_count: u32, stack_count: u32) -> MeshData {
    let slices = slice_count.max(3);
    let stacks = stack_count.max(2);

    let mut mesh = MeshData::default();
    mesh.vertices
        .push(Vertex::new(Vec3::new(0.0, radius, 0.0), Vec3::Y, [0.0, 0.0], Vec3::X));

    let phi_step = PI / stacks as f32;
    let theta_step = TAU / slices as f32;

    // Rings between the poles. Each ring repeats its first vertex for the texture seam.
    for i in 1..stacks {
        let phi = i as f32 * phi_step;
        for j in 0..=slices {
            let theta = j as f32 * theta_step;
            let position = radius * Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            let tangent = Vec3::new(-theta.sin(), 0.0, theta.cos());
            mesh.vertices.push(Vertex::new(
                position,
                position.normalize_or_zero(),
                [theta / TAU, phi / PI],
                tangent,
            ));
        }
    }

    mesh.vertices
        .push(Vertex::new(Vec3::new(0.0, -radius, 0.0), Vec3::NEG_Y, [0.0, 1.0], Vec3::X));

    for j in 1..=slices {
        mesh.indices.extend_from_slice(&[0, j + 1, j]);
    }

    let base = 1;
    let ring = slices + 1;
    for i in 0..stacks - 2 {
        for j in 0..slices {
            mesh.indices.extend_from_slice(&[
                base + i * ring + j,
                base + i * ring + j + 1,
                base + (i + 1) * ring + j,
                base + (i + 1) * ring + j,
                base + i * ring + j + 1,
                base + (i + 1) * ring + j + 1,
            ]);
        }
    }

    let south = mesh.vertices.len() as u32 - 1;
    let last_ring = south - ring;
    for j in 0..slices {
        mesh.indices.extend_from_slice(&[south, last_ring + j, last_ring + j + 1]);
    }

    mesh
}
