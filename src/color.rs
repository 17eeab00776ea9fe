use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: material label → Color32
// ---------------------------------------------------------------------------

/// Maps material labels to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map from the set of known materials.
    pub fn new(materials: &BTreeSet<String>) -> Self {
        let palette = generate_palette(materials.len());
        let mapping = materials.iter().cloned().zip(palette).collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a material; unknown labels are grey.
    pub fn color_for(&self, material: &str) -> Color32 {
        self.mapping
            .get(material)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (material → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(m, c)| (m.clone(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_distinct() {
        let palette = generate_palette(4);
        assert_eq!(palette.len(), 4);
        let unique: BTreeSet<[u8; 4]> = palette.iter().map(|c| c.to_array()).collect();
        assert_eq!(unique.len(), 4);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn test_unknown_material_is_grey() {
        let materials: BTreeSet<String> = ["leaf", "pill"].iter().map(|s| s.to_string()).collect();
        let map = ColorMap::new(&materials);
        assert_ne!(map.color_for("leaf"), map.color_for("pill"));
        assert_eq!(map.color_for("rock"), Color32::GRAY);
        assert_eq!(map.legend_entries().len(), 2);
    }
}
