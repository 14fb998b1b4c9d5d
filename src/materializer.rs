use crate::material_registry::MaterialRegistry;
use crate::mesh::AssetImport;
use anyhow::{bail, Result};
use serde::Deserialize;

/// A named patch over one material. Name lookup, not ownership: the patch
/// targets whatever the asset registered under `material`, and a miss is
/// tolerated so a cosmetic rename in a newer asset cannot break scene
/// construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaterialOverride {
    pub material: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub roughness: Option<f32>,
    #[serde(default)]
    pub clear_roughness_map: bool,
    #[serde(default)]
    pub normal_scale: Option<f32>,
    #[serde(default)]
    pub clearcoat: Option<f32>,
}

impl MaterialOverride {
    /// Resolved RGBA for the configured color string, if it parses.
    pub fn parsed_color(&self) -> Option<[f32; 4]> {
        let raw = self.color.as_deref()?;
        match parse_color(raw) {
            Ok(color) => Some(color),
            Err(err) => {
                log::warn!("override for '{}' has unusable color: {err}", self.material);
                None
            }
        }
    }
}

/// Runs once when the asset load resolves: every mesh node both casts and
/// receives shadows, and the named overrides are applied through the shared
/// material table. Re-running with the same inputs reaches the same state.
pub fn materialize(
    import: &mut AssetImport,
    registry: &mut MaterialRegistry,
    overrides: &[MaterialOverride],
) {
    for node in &mut import.nodes {
        node.cast_shadow = true;
        node.receive_shadow = true;
    }
    registry.register_import(&import.materials, &import.textures);
    for patch in overrides {
        if !registry.apply_override(&patch.material, patch) {
            log::warn!("material '{}' not present in asset; override skipped", patch.material);
        }
    }
}

/// Accepts `#rgb`, `#rrggbb`, or a handful of CSS color names.
pub fn parse_color(raw: &str) -> Result<[f32; 4]> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        let digits: Vec<u32> = hex
            .chars()
            .map(|c| c.to_digit(16).ok_or_else(|| anyhow::anyhow!("Invalid hex digit '{c}' in '{raw}'")))
            .collect::<Result<_>>()?;
        let (r, g, b) = match digits.as_slice() {
            [r, g, b] => (r * 17, g * 17, b * 17),
            [r1, r0, g1, g0, b1, b0] => (r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0),
            _ => bail!("Color '{raw}' must be #rgb or #rrggbb"),
        };
        return Ok([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "black" => Ok([0.0, 0.0, 0.0, 1.0]),
        "white" => Ok([1.0, 1.0, 1.0, 1.0]),
        "gray" | "grey" => Ok([0.5, 0.5, 0.5, 1.0]),
        "red" => Ok([1.0, 0.0, 0.0, 1.0]),
        "green" => Ok([0.0, 0.5, 0.0, 1.0]),
        "blue" => Ok([0.0, 0.0, 1.0, 1.0]),
        other => bail!("Unknown color '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        let short = parse_color("#222").expect("short hex");
        let long = parse_color("#222222").expect("long hex");
        assert_eq!(short, long);
        assert!((short[0] - 0x22 as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(parse_color("black").expect("named"), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(parse_color("White").expect("named"), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_color("#22").is_err());
        assert!(parse_color("fuchsia-ish").is_err());
    }
}
