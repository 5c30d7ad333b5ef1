use serde::{Deserialize, Serialize};

/// Default chart palette, cycled by series index.
pub const DEFAULT_COLORS: [&str; 16] = [
    "#213147", "#4a4a4a", "#0557f5", "#ff677d", "#9ecff2", "#ffcdb2", "#ffd1dc", "#e0e3d1",
    "#16553b", "#959595", "#9ab4e6", "#ffa060", "#a172c3", "#4a6db1", "#041d7e", "#04e3c9",
];

/// How series are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
    /// Bars stacked on top of each other.
    Stacked,
    /// Stacked bars rescaled so each date sums to 100.
    Percent,
    /// Bars on the primary axis, last series as a line on the secondary axis.
    BarLine,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    #[default]
    Date,
    Category,
    Linear,
}

/// Presentation settings for a chart. Never touches the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customization {
    pub title: String,
    pub subtitle: String,
    pub x_axis_title: String,
    pub y_axis_title: String,
    pub y2_axis_title: String,
    pub y_axis_prefix: String,
    pub y_axis_suffix: String,
    pub y_axis_min: Option<f64>,
    pub y_axis_max: Option<f64>,
    pub show_grid: bool,
    pub x_axis_type: AxisType,
    pub chart_type: ChartType,
    pub fill: bool,
    /// Attribution shown in the corner annotation.
    pub source: String,
    pub colors: Vec<String>,
    /// URL or data URI of a logo drawn behind the plot.
    pub watermark: Option<String>,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            x_axis_title: String::new(),
            y_axis_title: String::new(),
            y2_axis_title: String::new(),
            y_axis_prefix: String::new(),
            y_axis_suffix: String::new(),
            y_axis_min: None,
            y_axis_max: None,
            show_grid: true,
            x_axis_type: AxisType::Date,
            chart_type: ChartType::Line,
            fill: false,
            source: String::new(),
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
            watermark: None,
        }
    }
}

impl Customization {
    /// Colour for series `index`, cycling through the palette.
    pub fn color_at(&self, index: usize) -> &str {
        if self.colors.is_empty() {
            return DEFAULT_COLORS[index % DEFAULT_COLORS.len()];
        }
        &self.colors[index % self.colors.len()]
    }

    /// Half-transparent variant of [`Customization::color_at`] for area fills.
    pub fn fill_color_at(&self, index: usize) -> String {
        let (r, g, b) = hex_to_rgb(self.color_at(index)).unwrap_or((0, 0, 0));
        format!("rgba({}, {}, {}, 0.5)", r, g, b)
    }
}

/// Parses `#rrggbb` (the leading `#` is optional).
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Upper-cases the first character, as series names appear in legends.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_cycles() {
        let custom = Customization::default();
        assert_eq!(custom.color_at(0), "#213147");
        assert_eq!(custom.color_at(16), "#213147");
        assert_eq!(custom.color_at(17), "#4a4a4a");
    }

    #[test]
    fn fill_color_is_half_alpha() {
        let custom = Customization::default();
        assert_eq!(custom.fill_color_at(2), "rgba(5, 87, 245, 0.5)");
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(hex_to_rgb("#ff677d"), Some((255, 103, 125)));
        assert_eq!(hex_to_rgb("04e3c9"), Some((4, 227, 201)));
        assert_eq!(hex_to_rgb("#fff"), None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let custom: Customization =
            serde_json::from_str(r#"{"title":"TVL","chartType":"bar-line","yAxisMax":10}"#)
                .unwrap();
        assert_eq!(custom.title, "TVL");
        assert_eq!(custom.chart_type, ChartType::BarLine);
        assert_eq!(custom.y_axis_max, Some(10.0));
        assert!(custom.show_grid);
        assert_eq!(custom.colors.len(), 16);
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("ethereum"), "Ethereum");
        assert_eq!(capitalize(""), "");
    }
}
