//! Colours and sizes shared by every chart.

use ny511_config::ChartSettings;
use plotters::style::RGBColor;

const LIGHT_TEXT: RGBColor = RGBColor(220, 220, 220);
const DARK_TEXT: RGBColor = RGBColor(33, 33, 33);

/// Font family used for captions and labels.
pub const FONT_FAMILY: &str = "sans-serif";

/// Resolved chart styling.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    /// Text and axis colour.
    pub foreground: RGBColor,
    pub point: RGBColor,
    pub point_opacity: f64,
    pub point_size: u32,
    pub heat_low: RGBColor,
    pub heat_high: RGBColor,
    pub bar: RGBColor,
}

impl ChartStyle {
    pub fn from_settings(settings: &ChartSettings) -> Self {
        let background = parse_color(&settings.background_color).unwrap_or(RGBColor(30, 30, 30));
        Self {
            width: settings.width,
            height: settings.height,
            background,
            foreground: if settings.dark_theme { LIGHT_TEXT } else { DARK_TEXT },
            point: parse_color(&settings.point_color).unwrap_or(RGBColor(255, 127, 14)),
            point_opacity: settings.point_opacity.clamp(0.0, 1.0),
            point_size: settings.point_size.max(1),
            heat_low: parse_color(&settings.heat_low_color).unwrap_or(RGBColor(14, 68, 41)),
            heat_high: parse_color(&settings.heat_high_color).unwrap_or(RGBColor(57, 211, 83)),
            bar: parse_color(&settings.bar_color).unwrap_or(RGBColor(31, 119, 180)),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Caption font size scaled to the image height.
    pub fn caption_size(&self) -> u32 {
        (self.height / 32).clamp(14, 32)
    }

    /// Axis label font size scaled to the image height.
    pub fn label_size(&self) -> u32 {
        (self.height / 60).clamp(10, 18)
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self::from_settings(&ChartSettings::default())
    }
}

/// Parse a `#RRGGBB` colour.
pub fn parse_color(value: &str) -> Option<RGBColor> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Linear blend from `low` at 0.0 to `high` at 1.0. `t` is clamped.
pub fn interpolate(low: RGBColor, high: RGBColor, t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
}
