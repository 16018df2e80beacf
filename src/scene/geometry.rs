use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit sRGB colour as shown to the user and stored on materials.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `numerator / denominator`, truncating toward zero.
    /// Integer arithmetic keeps the result exact: `scaled(4, 5)` is `floor(c * 0.8)`.
    pub fn scaled(self, numerator: u8, denominator: u8) -> Self {
        let scale = |channel: u8| -> u8 {
            if denominator == 0 {
                return channel;
            }
            let value = u16::from(channel) * u16::from(numerator) / u16::from(denominator);
            value.min(u16::from(u8::MAX)) as u8
        };
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }

    /// Converts a glTF base colour factor (0.0..=1.0 per channel).
    pub fn from_factor(factor: [f32; 3]) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(channel(factor[0]), channel(factor[1]), channel(factor[2]))
    }

    pub fn to_factor(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Primitive topology of a mesh, used as the geometry type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl GeometryKind {
    pub fn label(self) -> &'static str {
        match self {
            GeometryKind::Points => "Points",
            GeometryKind::Lines => "Lines",
            GeometryKind::LineLoop => "LineLoop",
            GeometryKind::LineStrip => "LineStrip",
            GeometryKind::Triangles => "Triangles",
            GeometryKind::TriangleStrip => "TriangleStrip",
            GeometryKind::TriangleFan => "TriangleFan",
        }
    }

    /// glTF `primitive.mode` value.
    pub fn gltf_mode(self) -> u32 {
        match self {
            GeometryKind::Points => 0,
            GeometryKind::Lines => 1,
            GeometryKind::LineLoop => 2,
            GeometryKind::LineStrip => 3,
            GeometryKind::Triangles => 4,
            GeometryKind::TriangleStrip => 5,
            GeometryKind::TriangleFan => 6,
        }
    }
}

/// Draco primitive that was loaded without a decoder attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndecodedDraco {
    pub vertex_count: usize,
    pub index_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Option<Vec<u32>>,
    pub undecoded: Option<UndecodedDraco>,
}

impl Geometry {
    pub fn new(kind: GeometryKind, positions: Vec<[f32; 3]>) -> Self {
        Self {
            kind,
            positions,
            normals: Vec::new(),
            indices: None,
            undecoded: None,
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn undecoded(kind: GeometryKind, info: UndecodedDraco) -> Self {
        Self {
            kind,
            positions: Vec::new(),
            normals: Vec::new(),
            indices: None,
            undecoded: Some(info),
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self.undecoded {
            Some(info) if self.positions.is_empty() => info.vertex_count,
            _ => self.positions.len(),
        }
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty() && self.normals.len() == self.positions.len()
    }

    pub fn local_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().copied().map(Vec3::from))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    Standard,
    Unlit,
}

impl MaterialKind {
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Standard => "MeshStandardMaterial",
            MaterialKind::Unlit => "MeshBasicMaterial",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub name: Option<String>,
    pub color: Color,
    pub alpha: f32,
    pub metallic: f32,
    pub roughness: f32,
}

impl Material {
    pub fn standard(color: Color) -> Self {
        Self {
            kind: MaterialKind::Standard,
            name: None,
            color,
            alpha: 1.0,
            metallic: 1.0,
            roughness: 1.0,
        }
    }

    pub fn unlit(color: Color) -> Self {
        Self {
            kind: MaterialKind::Unlit,
            ..Self::standard(color)
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), point| {
            (min.min(point), max.max(point))
        });
        Some(Self { min, max })
    }

    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = (0..8).map(|corner| {
            let pick = |bit: u32, lo: f32, hi: f32| if corner & bit == 0 { lo } else { hi };
            matrix.transform_point3(Vec3::new(
                pick(1, self.min.x, self.max.x),
                pick(2, self.min.y, self.max.y),
                pick(4, self.min.z, self.max.z),
            ))
        });
        // Eight corners always yield a box.
        Aabb::from_points(corners).unwrap_or(*self)
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Slab test. Returns the entry distance along the ray, or zero when the
    /// origin is inside the box.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let inv = ray.direction.recip();
        let t0 = (self.min - ray.origin) * inv;
        let t1 = (self.max - ray.origin) * inv;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();
        if near > far || far < 0.0 || near.is_nan() || far.is_nan() {
            return None;
        }
        Some(near.max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_truncates_each_channel() {
        let color = Color::new(200, 100, 50);
        assert_eq!(color.scaled(4, 5), Color::new(160, 80, 40));
        assert_eq!(Color::new(1, 2, 3).scaled(4, 5), Color::new(0, 1, 2));
        assert_eq!(Color::WHITE.scaled(4, 5), Color::new(204, 204, 204));
    }

    #[test]
    fn factor_conversion_rounds_to_nearest() {
        let color = Color::from_factor([0.5, 1.0, 0.0]);
        assert_eq!(color, Color::new(128, 255, 0));
        assert_eq!(Color::from_factor(color.to_factor()), color);
        assert_eq!(Color::from_factor([2.0, -1.0, 0.2]), Color::new(255, 0, 51));
    }

    #[test]
    fn ray_hits_box_in_front_and_misses_behind() {
        let bounds = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let hit = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bounds.intersect(&hit), Some(4.0));

        let behind = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(bounds.intersect(&behind).is_none());

        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(bounds.intersect(&inside), Some(0.0));
    }

    #[test]
    fn transformed_bounds_follow_translation() {
        let bounds = Aabb {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        let moved = bounds.transformed(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(moved.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(moved.max, Vec3::new(3.0, 1.0, 1.0));
    }
}
