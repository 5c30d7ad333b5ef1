use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::customization::{AxisType, ChartType, Customization, capitalize};
use crate::projector::{Axis, Mark, SeriesMap, place_series};

/// Multiplier applied to every font and margin of the export layout.
pub const EXPORT_SCALE_FACTOR: f64 = 2.0;

const BACKGROUND: &str = "#030d1c";
const ANNOTATION_BACKGROUND: &str = "#1f2c56";
const GRID_COLOR: &str = "rgba(173, 176, 181, 0.6)";
const BASE_FONT_SIZE: f64 = 14.0;
const ANNOTATION_FONT_SIZE: f64 = 13.0;

/// Plotly-style figure: a list of traces plus a layout object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

/// Builds the figure handed to the chart renderer
///
/// Traces follow grid column order. Colours come from the customization
/// palette by series index and bar+line charts put the last series on a
/// second y axis.
///
/// # Arguments
/// * `map` - Projected series
/// * `custom` - Presentation settings
///
/// # Returns
/// * `Figure` - Traces and layout, ready to serialise
pub fn build_figure(map: &SeriesMap, custom: &Customization) -> Figure {
    build_figure_dated(map, custom, Local::now().date_naive())
}

/// [`build_figure`] with an explicit date for the source annotation.
pub fn build_figure_dated(map: &SeriesMap, custom: &Customization, today: NaiveDate) -> Figure {
    let placements = place_series(map, custom.chart_type);
    let data = map
        .iter()
        .zip(&placements)
        .enumerate()
        .map(|(i, ((name, series), placement))| {
            let mut trace = json!({
                "x": series.timestamps,
                "y": series.values,
                "name": capitalize(name),
            });
            let color = custom.color_at(i);
            match placement.mark {
                Mark::Line => {
                    trace["type"] = json!("scatter");
                    trace["mode"] = json!("lines");
                    trace["line"] = json!({ "width": 3, "color": color });
                    if custom.fill {
                        trace["fill"] = json!("tonexty");
                        trace["fillcolor"] = json!(custom.fill_color_at(i));
                    }
                }
                Mark::Bar => {
                    trace["type"] = json!("bar");
                    trace["marker"] = json!({ "color": color });
                }
            }
            if placement.axis == Axis::Secondary {
                trace["yaxis"] = json!("y2");
            }
            trace
        })
        .collect();

    Figure {
        data,
        layout: build_layout(map, custom, today),
    }
}

fn build_layout(map: &SeriesMap, custom: &Customization, today: NaiveDate) -> Value {
    let mut title = if custom.title.is_empty() {
        String::new()
    } else {
        format!("<b>{}</b>", custom.title)
    };
    if !custom.subtitle.is_empty() {
        title.push_str(&format!("<br><sup>{}</sup>", custom.subtitle));
    }

    let mut xaxis = json!({
        "type": axis_type_name(custom.x_axis_type),
        "title": { "text": custom.x_axis_title },
        "showgrid": custom.show_grid,
    });
    if custom.x_axis_type == AxisType::Date {
        xaxis["tickformat"] = json!("%b %Y");
    }

    let suffix = match (custom.chart_type, custom.y_axis_suffix.is_empty()) {
        (ChartType::Percent, true) => "%".to_string(),
        _ => custom.y_axis_suffix.clone(),
    };
    let mut yaxis = json!({
        "title": { "text": custom.y_axis_title },
        "tickprefix": custom.y_axis_prefix,
        "ticksuffix": suffix,
        "showgrid": custom.show_grid,
        "gridcolor": GRID_COLOR,
        "rangemode": "tozero",
    });
    if let Some((low, high)) = y_range(map, custom) {
        yaxis["range"] = json!([low, high]);
    }

    let mut layout = json!({
        "title": { "text": title, "x": 0.5, "xanchor": "center" },
        "plot_bgcolor": BACKGROUND,
        "paper_bgcolor": BACKGROUND,
        "font": { "color": "white" },
        "xaxis": xaxis,
        "yaxis": yaxis,
        "legend": { "orientation": "h", "yanchor": "top", "y": -0.1, "xanchor": "center", "x": 0.5 },
    });

    match custom.chart_type {
        ChartType::Stacked | ChartType::Percent => layout["barmode"] = json!("stack"),
        ChartType::Bar | ChartType::BarLine => layout["barmode"] = json!("group"),
        ChartType::Line => {}
    }
    if custom.chart_type == ChartType::BarLine {
        layout["yaxis2"] = json!({
            "title": { "text": custom.y2_axis_title },
            "overlaying": "y",
            "side": "right",
            "showgrid": false,
        });
    }
    if !custom.source.is_empty() {
        layout["annotations"] = json!([source_annotation(&custom.source, today, 1.0)]);
    }
    if let Some(watermark) = &custom.watermark {
        layout["images"] = json!([watermark_image(watermark)]);
    }
    layout
}

fn axis_type_name(axis: AxisType) -> &'static str {
    match axis {
        AxisType::Date => "date",
        AxisType::Category => "category",
        AxisType::Linear => "linear",
    }
}

/// Explicit y range when either bound is pinned; the other side falls back
/// to the data extent (or 0 for an empty chart).
fn y_range(map: &SeriesMap, custom: &Customization) -> Option<(f64, f64)> {
    if custom.y_axis_min.is_none() && custom.y_axis_max.is_none() {
        return None;
    }
    let values = || map.iter().flat_map(|(_, series)| series.values.iter().copied());
    let data_min = values().fold(f64::INFINITY, f64::min);
    let data_max = values().fold(f64::NEG_INFINITY, f64::max);
    let low = custom
        .y_axis_min
        .unwrap_or(if data_min.is_finite() { data_min.min(0.0) } else { 0.0 });
    let high = custom
        .y_axis_max
        .unwrap_or(if data_max.is_finite() { data_max } else { 0.0 });
    Some((low, high))
}

fn source_annotation(source: &str, today: NaiveDate, scale: f64) -> Value {
    json!({
        "text": format!("<b>{}</b> <br>Date: {}", source, today.format("%Y-%m-%d")),
        "font": { "size": ANNOTATION_FONT_SIZE * scale, "color": "white" },
        "showarrow": false,
        "xref": "paper",
        "yref": "paper",
        "x": 0.99,
        "y": -0.15,
        "xanchor": "right",
        "yanchor": "bottom",
        "bgcolor": ANNOTATION_BACKGROUND,
        "bordercolor": "white",
        "borderwidth": 1,
        "borderpad": 4,
    })
}

fn watermark_image(source: &str) -> Value {
    json!({
        "source": source,
        "xref": "paper",
        "yref": "paper",
        "x": 0.5,
        "y": 0.5,
        "sizex": 0.3,
        "sizey": 0.3,
        "xanchor": "center",
        "yanchor": "middle",
        "opacity": 0.25,
        "layer": "above",
    })
}

/// Title object with a fallback text and a scaled white font.
///
/// Accepts either a bare string or a `{ text, font }` object.
fn export_title(title: Option<&Value>, default_text: &str) -> Value {
    let (text, size) = match title {
        Some(Value::String(text)) => (text.as_str(), BASE_FONT_SIZE),
        Some(Value::Object(obj)) => (
            obj.get("text").and_then(Value::as_str).unwrap_or(""),
            obj.get("font")
                .and_then(|font| font.get("size"))
                .and_then(Value::as_f64)
                .unwrap_or(BASE_FONT_SIZE),
        ),
        _ => ("", BASE_FONT_SIZE),
    };
    let text = if text.is_empty() { default_text } else { text };
    json!({
        "text": text,
        "font": { "size": size * EXPORT_SCALE_FACTOR, "color": "white" },
    })
}

/// Copies an axis object from the on-screen layout so export settings can be
/// laid over it.
fn base_axis(layout: &Value, key: &str) -> Map<String, Value> {
    layout
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// High-resolution variant of an on-screen layout
///
/// Fonts are scaled, missing titles get defaults ("Main Title", "Date",
/// "Value", "Value (Right)"), the background is forced dark and the source
/// annotation is always present. Axis settings from the original layout
/// (type, range, prefixes) survive.
///
/// # Arguments
/// * `layout` - Layout of the figure being exported
/// * `source` - Attribution text for the corner annotation
/// * `watermark` - Optional logo drawn behind the plot
pub fn export_layout(layout: &Value, source: &str, watermark: Option<&str>) -> Value {
    export_layout_dated(layout, source, watermark, Local::now().date_naive())
}

/// [`export_layout`] with an explicit date for the source annotation.
pub fn export_layout_dated(
    layout: &Value,
    source: &str,
    watermark: Option<&str>,
    today: NaiveDate,
) -> Value {
    let scaled = BASE_FONT_SIZE * EXPORT_SCALE_FACTOR;
    let tickfont = json!({ "size": scaled, "color": "white" });

    let mut xaxis = base_axis(layout, "xaxis");
    let x_title = export_title(xaxis.get("title"), "Date");
    xaxis.insert("title".into(), x_title);
    xaxis.insert("tickfont".into(), tickfont.clone());
    xaxis.insert("showgrid".into(), json!(false));
    xaxis.insert("linecolor".into(), json!("white"));
    xaxis.insert("rangeslider".into(), json!({ "visible": false }));

    let mut yaxis = base_axis(layout, "yaxis");
    let y_title = export_title(yaxis.get("title"), "Value");
    yaxis.insert("title".into(), y_title);
    yaxis.insert("tickfont".into(), tickfont.clone());
    yaxis.insert("showgrid".into(), json!(true));
    yaxis.insert("gridcolor".into(), json!(GRID_COLOR));
    yaxis.insert("linecolor".into(), json!("white"));

    let mut yaxis2 = base_axis(layout, "yaxis2");
    let y2_title = export_title(yaxis2.get("title"), "Value (Right)");
    yaxis2.insert("overlaying".into(), json!("y"));
    yaxis2.insert("side".into(), json!("right"));
    yaxis2.insert("title".into(), y2_title);
    yaxis2.insert("tickfont".into(), tickfont);
    yaxis2.insert("showgrid".into(), json!(false));
    yaxis2.insert("linecolor".into(), json!("white"));

    let main_title = export_title(layout.get("title"), "Main Title");
    let margin = 100.0 * EXPORT_SCALE_FACTOR;

    let mut exported = json!({
        "title": {
            "text": main_title["text"],
            "font": main_title["font"],
            "xanchor": "center",
            "x": 0.5,
        },
        "plot_bgcolor": BACKGROUND,
        "paper_bgcolor": BACKGROUND,
        "font": { "size": scaled, "color": "white" },
        "xaxis": xaxis,
        "yaxis": yaxis,
        "yaxis2": yaxis2,
        "legend": {
            "orientation": "h",
            "yanchor": "top",
            "y": -0.1,
            "xanchor": "center",
            "x": 0.5,
            "font": { "size": scaled, "color": "white" },
        },
        "annotations": [source_annotation(source, today, EXPORT_SCALE_FACTOR)],
        "margin": { "l": margin, "r": margin, "t": margin, "b": margin },
    });
    if let Some(barmode) = layout.get("barmode") {
        exported["barmode"] = barmode.clone();
    }
    if let Some(watermark) = watermark {
        exported["images"] = json!([watermark_image(watermark)]);
    }
    exported
}
