//! Conversion options.

use std::path::Path;

use serde::{Deserialize, Serialize};
use shapegraph_kernel::Rgba;

use crate::error::{ConvertError, Result};

/// Parameters controlling a scene conversion.
///
/// Loaded from TOML with every field optional; missing fields take the
/// [`Default`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Relative deviation. The absolute deflection of each shape scales with
    /// its size.
    pub deviation: f64,
    /// Angular tolerance in radians.
    pub angular_tolerance: f64,
    /// Absolute deflection for inline edges. `None` uses `quality / 100`.
    pub edge_accuracy: Option<f64>,
    /// Ask the mesher for edge segments.
    pub render_edges: bool,
    /// Emit assembly mates as coordinate systems.
    pub render_mates: bool,
    /// Outline the shapes a shape object was derived from, ahead of it.
    pub show_parent: bool,
    /// Size of coordinate helper nodes.
    pub helper_scale: f64,
    /// Fail on unsupported objects instead of skipping them.
    pub strict: bool,
    /// Tessellate on the rayon pool.
    pub parallel: bool,
    /// Worker count for tessellation. `None` uses the global pool.
    pub threads: Option<usize>,
    /// Default solid color.
    pub default_color: Rgba,
    /// Default face color.
    pub face_color: Rgba,
    /// Default edge color.
    pub edge_color: Rgba,
    /// Default vertex color.
    pub vertex_color: Rgba,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            deviation: 0.1,
            angular_tolerance: 0.2,
            edge_accuracy: None,
            render_edges: true,
            render_mates: false,
            show_parent: false,
            helper_scale: 1.0,
            strict: true,
            parallel: true,
            threads: None,
            default_color: Rgba::from_u8(0xe8, 0xb0, 0x24),
            face_color: Rgba::from_u8(0xee, 0x82, 0xee),
            edge_color: Rgba::from_u8(0xba, 0x55, 0xd3),
            vertex_color: Rgba::from_u8(0xba, 0x55, 0xd3),
        }
    }
}

impl ConvertOptions {
    /// Validate options.
    pub fn validate(&self) -> Result<()> {
        if self.deviation <= 0.0 || !self.deviation.is_finite() {
            return Err(ConvertError::InvalidOptions(
                "deviation must be positive".into(),
            ));
        }
        if self.angular_tolerance <= 0.0 || !self.angular_tolerance.is_finite() {
            return Err(ConvertError::InvalidOptions(
                "angular_tolerance must be positive".into(),
            ));
        }
        if let Some(acc) = self.edge_accuracy {
            if acc <= 0.0 || !acc.is_finite() {
                return Err(ConvertError::InvalidOptions(
                    "edge_accuracy must be positive".into(),
                ));
            }
        }
        if self.helper_scale <= 0.0 || !self.helper_scale.is_finite() {
            return Err(ConvertError::InvalidOptions(
                "helper_scale must be positive".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(ConvertError::InvalidOptions(
                "threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse options from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a TOML file and validate them.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
