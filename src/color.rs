use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct RGB colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<[u8; 3]> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            [
                (rgb.red * 255.0).round() as u8,
                (rgb.green * 255.0).round() as u8,
                (rgb.blue * 255.0).round() as u8,
            ]
        })
        .collect()
}

pub fn to_hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

// ---------------------------------------------------------------------------
// Sample colours for plotting collaborators
// ---------------------------------------------------------------------------

/// Fixed sample → colour table, assigned in sorted sample order so the same
/// directory always yields the same colours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SampleColors {
    mapping: BTreeMap<String, String>,
}

impl SampleColors {
    pub const DEFAULT_COLOR: &'static str = "#808080";

    pub fn new<'a>(samples: impl IntoIterator<Item = &'a str>) -> Self {
        let mut names: Vec<&str> = samples.into_iter().collect();
        names.sort_unstable();
        names.dedup();

        let palette = generate_palette(names.len());
        let mapping = names
            .into_iter()
            .zip(palette)
            .map(|(name, rgb)| (name.to_string(), to_hex(rgb)))
            .collect();
        SampleColors { mapping }
    }

    pub fn color_for(&self, sample: &str) -> &str {
        self.mapping
            .get(sample)
            .map(String::as_str)
            .unwrap_or(Self::DEFAULT_COLOR)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
