//! Geometry generators for common shapes.
//!
//! Handy for tests, benchmarks and debug draws: each call returns a fresh
//! [`GeometryData`] ready to be packed into an arena.

use super::data::GeometryData;
use super::layout::VertexLayout;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PnuVertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PuVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

/// Generate a quad on the XY plane, centered at the origin.
///
/// Uses the `position_uv` layout (20 bytes per vertex) and u16 indices.
/// UV coordinates go from (0,0) at top-left to (1,1) at bottom-right.
pub fn generate_quad(half_width: f32, half_height: f32) -> GeometryData {
    let vertices = [
        PuVertex {
            position: [-half_width, -half_height, 0.0],
            uv: [0.0, 1.0],
        },
        PuVertex {
            position: [half_width, -half_height, 0.0],
            uv: [1.0, 1.0],
        },
        PuVertex {
            position: [half_width, half_height, 0.0],
            uv: [1.0, 0.0],
        },
        PuVertex {
            position: [-half_width, half_height, 0.0],
            uv: [0.0, 0.0],
        },
    ];

    GeometryData::new(VertexLayout::position_uv())
        .with_vertices(&vertices)
        .with_indices_u16(&[0, 1, 2, 2, 3, 0])
        .with_label("quad")
}

/// Generate an axis-aligned cube centered at the origin.
///
/// Each face has its own four vertices so normals stay flat. Uses the
/// `position_normal_uv` layout (32 bytes per vertex) and u16 indices.
pub fn generate_cube(half_extent: f32) -> GeometryData {
    let h = half_extent;
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners: [([f32; 2], [f32; 2]); 4] = [
        ([-1.0, -1.0], [0.0, 1.0]),
        ([1.0, -1.0], [1.0, 1.0]),
        ([1.0, 1.0], [1.0, 0.0]),
        ([-1.0, 1.0], [0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, (n, u, v)) in faces.iter().enumerate() {
        for (corner, uv) in &corners {
            let position = [
                (n[0] + u[0] * corner[0] + v[0] * corner[1]) * h,
                (n[1] + u[1] * corner[0] + v[1] * corner[1]) * h,
                (n[2] + u[2] * corner[0] + v[2] * corner[1]) * h,
            ];
            vertices.push(PnuVertex {
                position,
                normal: *n,
                uv: *uv,
            });
        }

        let base = (face * 4) as u16;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    GeometryData::new(VertexLayout::position_normal_uv())
        .with_vertices(&vertices)
        .with_indices_u16(&indices)
        .with_label("cube")
}
