use crate::scene::{Color, Geometry, GeometryKind};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

/// Geometry expanded into an indexed triangle or line list, ready to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub topology: Topology,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// `None` for points, undecoded Draco payloads, empty geometry and
    /// out-of-range indices.
    pub fn from_geometry(geometry: &Geometry) -> Option<Self> {
        if geometry.undecoded.is_some() || geometry.positions.is_empty() {
            return None;
        }
        let vertex_count = geometry.positions.len();
        let source: Vec<u32> = match &geometry.indices {
            Some(indices) => indices.clone(),
            None => (0..vertex_count as u32).collect(),
        };
        if source.iter().any(|&index| index as usize >= vertex_count) {
            log::warn!("[render] skipping geometry with out-of-range indices");
            return None;
        }

        let (topology, indices) = match geometry.kind {
            GeometryKind::Points => return None,
            GeometryKind::Triangles => {
                let whole = source.len() - source.len() % 3;
                (Topology::Triangles, source[..whole].to_vec())
            }
            GeometryKind::TriangleStrip => (Topology::Triangles, strip_to_list(&source)),
            GeometryKind::TriangleFan => (Topology::Triangles, fan_to_list(&source)),
            GeometryKind::Lines => {
                let whole = source.len() - source.len() % 2;
                (Topology::Lines, source[..whole].to_vec())
            }
            GeometryKind::LineStrip => (Topology::Lines, segments(&source, false)),
            GeometryKind::LineLoop => (Topology::Lines, segments(&source, true)),
        };
        if indices.is_empty() {
            return None;
        }

        let normals = if geometry.has_normals() {
            geometry.normals.clone()
        } else if topology == Topology::Triangles {
            smooth_normals(&geometry.positions, &indices)
        } else {
            vec![[0.0, 1.0, 0.0]; vertex_count]
        };

        Some(Self {
            topology,
            positions: geometry.positions.clone(),
            normals,
            indices,
        })
    }
}

fn strip_to_list(strip: &[u32]) -> Vec<u32> {
    strip
        .windows(3)
        .enumerate()
        .flat_map(|(i, w)| {
            // Every odd triangle is flipped to keep a consistent winding.
            if i % 2 == 0 {
                [w[0], w[1], w[2]]
            } else {
                [w[1], w[0], w[2]]
            }
        })
        .collect()
}

fn fan_to_list(fan: &[u32]) -> Vec<u32> {
    let Some((&hub, rest)) = fan.split_first() else {
        return Vec::new();
    };
    rest.windows(2).flat_map(|w| [hub, w[0], w[1]]).collect()
}

fn segments(points: &[u32], closed: bool) -> Vec<u32> {
    let mut list: Vec<u32> = points.windows(2).flat_map(|w| [w[0], w[1]]).collect();
    if closed && points.len() > 2 {
        if let (Some(&last), Some(&first)) = (points.last(), points.first()) {
            list.extend([last, first]);
        }
    }
    list
}

/// Area-weighted vertex normals.
fn smooth_normals(positions: &[[f32; 3]], triangles: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in triangles.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|index| index as usize);
        let pa = Vec3::from(positions[a]);
        let face = (Vec3::from(positions[b]) - pa).cross(Vec3::from(positions[c]) - pa);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    accum
        .into_iter()
        .map(|normal| {
            let normal = normal.normalize_or_zero();
            if normal == Vec3::ZERO {
                [0.0, 1.0, 0.0]
            } else {
                normal.to_array()
            }
        })
        .collect()
}

/// sRGB 8-bit colour to linear RGB for an sRGB render target.
pub fn linear_rgb(color: Color) -> [f32; 3] {
    color.to_factor().map(|channel| {
        if channel <= 0.040_45 {
            channel / 12.92
        } else {
            ((channel + 0.055) / 1.055).powf(2.4)
        }
    })
}
