//! # KTX Core
//!
//! Foundation shared by the KTX texture crates.
//!
//! This crate provides:
//! - **Errors**: The error taxonomy every operation reports through
//! - **Formats**: Block geometry of OpenGL and Vulkan pixel formats
//! - **Addressing**: Image sizes and offsets inside the packed data blob
//! - **Metadata**: The ordered key-value list attached to a texture
//! - **Config**: Create, load and write parameters

pub mod addressing;
pub mod config;
pub mod error;
pub mod format;
pub mod kvlist;

pub use addressing::{FaceSlice, Geometry, ImageLayout, LayoutRules, LevelOrder, WHOLE_LEVEL};
pub use config::{TextureCreateFlags, TextureCreateInfo, TextureCreateStorage, WriteOptions};
pub use error::{KtxError, KtxResult};
pub use format::{FormatFamily, FormatInfo, FormatSize, FormatSizeFlags, GlTransfer};
pub use kvlist::HashList;

use serde::{Deserialize, Serialize};

/// Container version a texture object belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassId {
    /// KTX version 1
    Ktx1,
    /// KTX version 2
    Ktx2,
}

/// Direction of increasing X
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrientationX {
    #[default]
    Right,
    Left,
}

/// Direction of increasing Y
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrientationY {
    #[default]
    Down,
    Up,
}

/// Direction of increasing Z
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrientationZ {
    #[default]
    Out,
    In,
}

/// Logical orientation of the stored images.
///
/// Carried for metadata round trips only; addressing never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub x: OrientationX,
    pub y: OrientationY,
    pub z: OrientationZ,
}

impl Orientation {
    fn chars(&self) -> [char; 3] {
        [
            match self.x {
                OrientationX::Right => 'r',
                OrientationX::Left => 'l',
            },
            match self.y {
                OrientationY::Down => 'd',
                OrientationY::Up => 'u',
            },
            match self.z {
                OrientationZ::Out => 'o',
                OrientationZ::In => 'i',
            },
        ]
    }

    fn set_axis(&mut self, axis: usize, c: char) -> Option<()> {
        match (axis, c) {
            (0, 'r') => self.x = OrientationX::Right,
            (0, 'l') => self.x = OrientationX::Left,
            (1, 'd') => self.y = OrientationY::Down,
            (1, 'u') => self.y = OrientationY::Up,
            (2, 'o') => self.z = OrientationZ::Out,
            (2, 'i') => self.z = OrientationZ::In,
            _ => return None,
        }
        Some(())
    }

    /// Parse a KTX 2 value such as `"rd"` or `"rdi"`
    pub fn parse_ktx2(value: &str) -> Option<Self> {
        let mut orientation = Self::default();
        if value.is_empty() || value.len() > 3 {
            return None;
        }
        for (axis, c) in value.chars().enumerate() {
            orientation.set_axis(axis, c)?;
        }
        Some(orientation)
    }

    /// Parse a KTX 1 value such as `"S=r,T=d"`
    pub fn parse_ktx1(value: &str) -> Option<Self> {
        let mut orientation = Self::default();
        for part in value.split(',') {
            let (name, c) = part.trim().split_once('=')?;
            let axis = match name {
                "S" => 0,
                "T" => 1,
                "R" => 2,
                _ => return None,
            };
            let mut chars = c.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            orientation.set_axis(axis, c)?;
        }
        Some(orientation)
    }

    /// Format as a KTX 2 value for a texture with `dims` dimensions
    pub fn to_ktx2_value(&self, dims: u32) -> String {
        self.chars().iter().take(dims.clamp(1, 3) as usize).collect()
    }

    /// Format as a KTX 1 value for a texture with `dims` dimensions
    pub fn to_ktx1_value(&self, dims: u32) -> String {
        ["S", "T", "R"]
            .iter()
            .zip(self.chars())
            .take(dims.clamp(1, 3) as usize)
            .map(|(name, c)| format!("{name}={c}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_ktx2() {
        let o = Orientation::parse_ktx2("lui").unwrap();
        assert_eq!(o.x, OrientationX::Left);
        assert_eq!(o.y, OrientationY::Up);
        assert_eq!(o.z, OrientationZ::In);
        assert_eq!(o.to_ktx2_value(3), "lui");
        assert_eq!(Orientation::default().to_ktx2_value(2), "rd");
        assert!(Orientation::parse_ktx2("rx").is_none());
        assert!(Orientation::parse_ktx2("").is_none());
    }

    #[test]
    fn test_orientation_ktx1() {
        let o = Orientation::parse_ktx1("S=r,T=u").unwrap();
        assert_eq!(o.y, OrientationY::Up);
        assert_eq!(o.to_ktx1_value(2), "S=r,T=u");
        assert_eq!(Orientation::default().to_ktx1_value(1), "S=r");
        assert!(Orientation::parse_ktx1("S=q").is_none());
        assert!(Orientation::parse_ktx1("rd").is_none());
    }
}
