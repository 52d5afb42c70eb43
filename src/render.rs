//! Renderable descriptions handed to the backend

use serde::{Deserialize, Serialize};

use ar_plus_spatial::Vector3D;

/// 32-bit ARGB color as sent by the host (`0xAARRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argb(pub u32);

impl Argb {
    pub const WHITE: Self = Argb(0xFFFF_FFFF);
    pub const RED: Self = Argb(0xFFFF_0000);
    pub const GREEN: Self = Argb(0xFF00_FF00);
    pub const YELLOW: Self = Argb(0xFFFF_FF00);
    /// Semi-transparent black used behind labels
    pub const SCRIM: Self = Argb(0x8000_0000);

    /// Accepts both unsigned and sign-extended 32-bit host integers
    pub fn from_host_int(value: i64) -> Self {
        Argb(value as u32)
    }

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(&self) -> u8 {
        self.0 as u8
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        [self.red(), self.green(), self.blue(), self.alpha()]
    }
}

impl Default for Argb {
    fn default() -> Self {
        Argb::YELLOW
    }
}

/// Geometry a backend can build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Cylinder { radius: f32, height: f32 },
    Sphere { radius: f32 },
    Cube { size: Vector3D },
    /// Billboard text, e.g. a distance label
    Text { content: String, background: Argb },
}

/// Surface material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Material {
    OpaqueColor { color: Argb },
}

impl Material {
    pub fn opaque(color: Argb) -> Self {
        Material::OpaqueColor { color }
    }
}

/// Backend-issued handle for a built renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderableId(pub u64);

/// A renderable the backend has finished building
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub id: RenderableId,
    pub geometry: Geometry,
    pub material: Material,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_channels() {
        let c = Argb(0x80FF_8040);
        assert_eq!(c.alpha(), 0x80);
        assert_eq!(c.red(), 0xFF);
        assert_eq!(c.green(), 0x80);
        assert_eq!(c.blue(), 0x40);
        assert_eq!(c.to_rgba(), [0xFF, 0x80, 0x40, 0x80]);
    }

    #[test]
    fn test_signed_host_int() {
        // Java/Kotlin ints arrive sign-extended.
        assert_eq!(Argb::from_host_int(-16711936), Argb::GREEN);
        assert_eq!(Argb::from_host_int(0xFF00FF00), Argb::GREEN);
    }
}
