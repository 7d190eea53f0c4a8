use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::config::RiskBucket;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues. Used to
/// color the feature-importance bars.
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

/// Fixed colour per risk bucket for table cells and labels.
pub fn risk_color(bucket: RiskBucket) -> Color32 {
    match bucket {
        RiskBucket::High => Color32::from_rgb(220, 68, 68),
        RiskBucket::Medium => Color32::from_rgb(230, 160, 30),
        RiskBucket::Low => Color32::from_rgb(60, 170, 90),
    }
}

/// Short label per risk bucket.
pub fn risk_label(bucket: RiskBucket) -> &'static str {
    match bucket {
        RiskBucket::High => "high",
        RiskBucket::Medium => "medium",
        RiskBucket::Low => "low",
    }
}
