//! RGBA colors attached to scene objects and shape nodes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A color with straight (non-premultiplied) alpha, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Alpha (1.0 = opaque).
    pub a: f64,
}

/// Error parsing a color literal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    /// Not a `#rrggbb` / `#rrggbbaa` literal.
    #[error("invalid color literal: {0:?}")]
    InvalidLiteral(String),
    /// A component is NaN or infinite.
    #[error("color component is not finite: {0:?}")]
    NonFinite([f64; 4]),
}

impl Rgba {
    /// Opaque color from 0..1 components.
    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Opaque color from 8-bit components.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(s: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::InvalidLiteral(s.to_string());
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| v as f64 / 255.0)
                .map_err(|_| invalid())
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 1.0 },
        })
    }

    /// Color from `[r, g, b, a]`, each clamped to `0.0..=1.0`.
    pub fn from_components(components: [f64; 4]) -> Result<Self, ColorError> {
        if components.iter().any(|v| !v.is_finite()) {
            return Err(ColorError::NonFinite(components));
        }
        let [r, g, b, a] = components.map(|v| v.clamp(0.0, 1.0));
        Ok(Self { r, g, b, a })
    }

    /// Same color with a different alpha (clamped to `0.0..=1.0`).
    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// `#rrggbb` representation (alpha dropped).
    pub fn to_hex(&self) -> String {
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", q(self.r), q(self.g), q(self.b))
    }

    /// Components as `[r, g, b, a]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RgbaRepr {
    Hex(String),
    Rgb([f64; 3]),
    Rgba([f64; 4]),
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RgbaRepr::deserialize(deserializer)? {
            RgbaRepr::Hex(s) => Rgba::from_hex(&s),
            RgbaRepr::Rgb([r, g, b]) => Rgba::from_components([r, g, b, 1.0]),
            RgbaRepr::Rgba(components) => Rgba::from_components(components),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Rgba::from_hex("#ff0080").unwrap();
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert!((c.b - 128.0 / 255.0).abs() < 1e-12);
        assert_eq!(c.a, 1.0);
        let c = Rgba::from_hex("00000080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Rgba::from_hex("#12345").is_err());
        assert!(Rgba::from_hex("#gg0000").is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(Rgba::from_hex("#e8b024").unwrap().to_hex(), "#e8b024");
    }

    #[test]
    fn test_with_alpha_clamps() {
        assert_eq!(Rgba::rgb(1.0, 1.0, 1.0).with_alpha(2.0).a, 1.0);
    }

    #[test]
    fn test_deserialize_forms() {
        let a: Rgba = serde_json::from_str("\"#ffffff\"").unwrap();
        let b: Rgba = serde_json::from_str("[1.0, 1.0, 1.0]").unwrap();
        let c: Rgba = serde_json::from_str("[1.0, 1.0, 1.0, 0.5]").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.a, 0.5);
        assert!(serde_json::from_str::<Rgba>("\"nope\"").is_err());
    }

    #[test]
    fn test_array_components_clamped() {
        let c: Rgba = serde_json::from_str("[1.5, -0.2, 0.5, 3.0]").unwrap();
        assert_eq!(c, Rgba { r: 1.0, g: 0.0, b: 0.5, a: 1.0 });
        let c: Rgba = serde_json::from_str("[2, 0, 0]").unwrap();
        assert_eq!(c.to_array(), [1.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            Rgba::from_components([f64::NAN, 0.0, 0.0, 1.0]),
            Err(ColorError::NonFinite(_))
        ));
    }

    #[test]
    fn test_serialize_as_array() {
        let s = serde_json::to_string(&Rgba::rgb(0.0, 0.5, 1.0)).unwrap();
        assert_eq!(s, "[0.0,0.5,1.0,1.0]");
    }
}
