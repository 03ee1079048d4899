//! Color parsing helpers for UI-supplied color strings.

use glam::Vec3;

use crate::error::{Result, Vol3dError};

/// Parses a `#rrggbb` (or `rrggbb`) string into normalized RGB.
///
/// # Errors
///
/// Returns [`Vol3dError::InvalidParameter`] if the string is not six hex digits.
pub fn parse_hex_color(text: &str) -> Result<Vec3> {
    let hex = text.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(Vol3dError::invalid_parameter("color", text, "expected #rrggbb"));
    }

    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|c| f32::from(c) / 255.0)
            .map_err(|_| Vol3dError::invalid_parameter("color", text, "expected #rrggbb"))
    };
    Ok(Vec3::new(channel(0)?, channel(2)?, channel(4)?))
}

/// Checks that `color` is finite normalized RGB.
///
/// # Errors
///
/// Returns [`Vol3dError::InvalidParameter`] naming `name` if any component is
/// non-finite or outside `[0, 1]`.
pub fn validate_rgb(name: &'static str, color: Vec3) -> Result<Vec3> {
    let normalized = color.cmpge(Vec3::ZERO).all() && color.cmple(Vec3::ONE).all();
    if color.is_finite() && normalized {
        Ok(color)
    } else {
        Err(Vol3dError::invalid_parameter(name, color, "expected normalized RGB"))
    }
}

/// Formats normalized RGB as `#rrggbb`.
pub fn to_hex_color(color: Vec3) -> String {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    format!("#{:02x}{:02x}{:02x}", c.x as u8, c.y as u8, c.z as u8)
}

/// Serde adapter storing a normalized RGB color as a `#rrggbb` string.
///
/// Use with `#[serde(with = "vol3d_core::color::hex")]`.
pub mod hex {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(color: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_color(*color))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_hex_color(&text).map_err(serde::de::Error::custom)
    }
}
