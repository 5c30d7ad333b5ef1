#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::customization::{ChartType, Customization, hex_to_rgb};
use crate::export::ImageFormat;
use crate::projector::{Axis, SeriesMap, place_series};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::ops::Range;

const BACKGROUND: RGBColor = RGBColor(0x03, 0x0d, 0x1c);
const GRID: RGBColor = RGBColor(173, 176, 181);

/// Size and encoding of a locally rendered chart
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// Output encoding
    pub format: ImageFormat,
}

impl Default for GraphOptions {
    /// 1000x600 PNG
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            format: ImageFormat::Png,
        }
    }
}

/// Renders projected series to an image
///
/// This is the local fallback renderer: it draws line, bar, stacked, percent
/// and bar+line charts with plotters and returns encoded image bytes.
/// Presentation (title, axis titles, tick prefix/suffix, grid, bounds,
/// palette) comes from the customization.
///
/// # Arguments
/// * `map` - Series to draw, in legend order
/// * `custom` - Presentation settings; `custom.chart_type` picks the chart
/// * `options` - Image size and format
///
/// # Returns
/// * A Result containing the PNG or JPEG bytes or an error
///
/// # Examples
/// ```no_run
/// use gridchart::customization::Customization;
/// use gridchart::graph::{render_chart, GraphOptions};
/// use gridchart::grid::Grid;
/// use gridchart::projector::project;
///
/// let grid = Grid::from_strs(&[&["date", "a"], &["2024-01-01", "1"], &["2024-01-02", "3"]]);
/// match render_chart(&project(&grid), &Customization::default(), &GraphOptions::default()) {
///     Ok(png) => println!("Chart rendered: {} bytes", png.len()),
///     Err(e) => eprintln!("Failed to render chart: {}", e),
/// }
/// ```
pub fn render_chart(
    map: &SeriesMap,
    custom: &Customization,
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let (width, height) = (options.width.max(1), options.height.max(1));
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&BACKGROUND)?;

        if custom.chart_type == ChartType::BarLine && map.len() > 1 {
            draw_dual_axis(&root, map, custom)?;
        } else {
            draw_single_axis(&root, map, custom)?;
        }

        root.present()?;
    }

    encode(&buffer, width, height, options.format)
}

/// Encodes a raw RGB buffer
fn encode(
    buffer: &[u8],
    width: u32,
    height: u32,
    format: ImageFormat,
) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut out = Vec::new();
    match format {
        ImageFormat::Png => {
            PngEncoder::new(&mut out).write_image(buffer, width, height, ColorType::Rgb8)?
        }
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, 90)
            .write_image(buffer, width, height, ColorType::Rgb8)?,
    }
    Ok(out)
}

/// Draws every chart type that lives on one y axis
fn draw_single_axis(
    root: &DrawingArea<BitMapBackend, Shift>,
    map: &SeriesMap,
    custom: &Customization,
) -> Result<(), Box<dyn Error>> {
    let names: Vec<&str> = map.names().collect();
    let timestamps = timestamps(map);
    let y_range = padded(primary_bounds(map, custom, &names));

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80);
    if !custom.title.is_empty() {
        builder.caption(&custom.title, ("sans-serif", 30).into_font().color(&WHITE));
    }
    let mut chart = builder.build_cartesian_2d(x_range(map.point_count()), y_range)?;

    let x_formatter = |x: &f64| x_label(&timestamps, *x);
    let y_formatter = |y: &f64| y_label(*y, &custom.y_axis_prefix, &y_suffix(custom));
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(custom.x_axis_title.as_str())
        .y_desc(custom.y_axis_title.as_str())
        .x_labels(map.point_count().clamp(1, 10))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .axis_style(WHITE)
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .axis_desc_style(("sans-serif", 16).into_font().color(&WHITE))
        .bold_line_style(GRID.mix(0.6))
        .light_line_style(TRANSPARENT);
    if !custom.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    let series: Vec<(usize, &str, Vec<f64>)> = map
        .iter()
        .enumerate()
        .map(|(i, (name, s))| (i, name, s.values.clone()))
        .collect();

    match custom.chart_type {
        ChartType::Line | ChartType::BarLine => {
            for (i, name, values) in &series {
                let color = palette_color(custom, *i);
                let points: Vec<(f64, f64)> = indexed(values);
                if custom.fill {
                    chart
                        .draw_series(
                            AreaSeries::new(points, 0.0, color.mix(0.5))
                                .border_style(color.stroke_width(3)),
                        )?
                        .label(*name)
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                } else {
                    chart
                        .draw_series(LineSeries::new(points, color.stroke_width(3)))?
                        .label(*name)
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                }
            }
        }
        ChartType::Bar => {
            for (i, name, values) in &series {
                let color = palette_color(custom, *i);
                chart
                    .draw_series(grouped_bars(values, *i, series.len(), color))?
                    .label(*name)
                    .legend(move |(x, y)| bar_legend(x, y, color));
            }
        }
        ChartType::Stacked | ChartType::Percent => {
            let columns: Vec<Vec<f64>> = series.iter().map(|(_, _, v)| v.clone()).collect();
            let segments = stack_segments(&columns);
            for ((i, name, _), spans) in series.iter().zip(segments) {
                let color = palette_color(custom, *i);
                chart
                    .draw_series(spans.into_iter().enumerate().map(|(x, (low, high))| {
                        let x = x as f64;
                        Rectangle::new([(x - 0.4, low), (x + 0.4, high)], color.filled())
                    }))?
                    .label(*name)
                    .legend(move |(x, y)| bar_legend(x, y, color));
            }
        }
    }

    if !series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerMiddle)
            .background_style(BACKGROUND.mix(0.8))
            .border_style(WHITE)
            .label_font(("sans-serif", 14).into_font().color(&WHITE))
            .draw()?;
    }
    Ok(())
}

/// Bars on the left axis, last series as a line on the right axis
fn draw_dual_axis(
    root: &DrawingArea<BitMapBackend, Shift>,
    map: &SeriesMap,
    custom: &Customization,
) -> Result<(), Box<dyn Error>> {
    let placements = place_series(map, ChartType::BarLine);
    let primary: Vec<&str> = placements
        .iter()
        .filter(|p| p.axis == Axis::Primary)
        .map(|p| p.name.as_str())
        .collect();
    let secondary: Vec<&str> = placements
        .iter()
        .filter(|p| p.axis == Axis::Secondary)
        .map(|p| p.name.as_str())
        .collect();
    let timestamps = timestamps(map);
    let points = map.point_count();

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .right_y_label_area_size(80);
    if !custom.title.is_empty() {
        builder.caption(&custom.title, ("sans-serif", 30).into_font().color(&WHITE));
    }
    let mut chart = builder
        .build_cartesian_2d(x_range(points), padded(primary_bounds(map, custom, &primary)))?
        .set_secondary_coord(x_range(points), padded(series_bounds(map, &secondary)));

    let x_formatter = |x: &f64| x_label(&timestamps, *x);
    let y_formatter = |y: &f64| y_label(*y, &custom.y_axis_prefix, &y_suffix(custom));
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(custom.x_axis_title.as_str())
        .y_desc(custom.y_axis_title.as_str())
        .x_labels(points.clamp(1, 10))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .axis_style(WHITE)
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .axis_desc_style(("sans-serif", 16).into_font().color(&WHITE))
        .bold_line_style(GRID.mix(0.6))
        .light_line_style(TRANSPARENT);
    if !custom.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    chart
        .configure_secondary_axes()
        .y_desc(custom.y2_axis_title.as_str())
        .axis_style(WHITE)
        .label_style(("sans-serif", 14).into_font().color(&WHITE))
        .axis_desc_style(("sans-serif", 16).into_font().color(&WHITE))
        .draw()?;

    for (i, (name, series)) in map.iter().enumerate() {
        let color = palette_color(custom, i);
        if primary.contains(&name) {
            chart
                .draw_series(grouped_bars(&series.values, i, primary.len(), color))?
                .label(name)
                .legend(move |(x, y)| bar_legend(x, y, color));
        } else {
            chart
                .draw_secondary_series(LineSeries::new(
                    indexed(&series.values),
                    color.stroke_width(3),
                ))?
                .label(name)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerMiddle)
        .background_style(BACKGROUND.mix(0.8))
        .border_style(WHITE)
        .label_font(("sans-serif", 14).into_font().color(&WHITE))
        .draw()?;
    Ok(())
}

fn bar_legend(x: i32, y: i32, color: RGBColor) -> Rectangle<(i32, i32)> {
    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
}

/// One bar per point, offset so `count` series sit side by side
fn grouped_bars(
    values: &[f64],
    slot: usize,
    count: usize,
    color: RGBColor,
) -> impl Iterator<Item = Rectangle<(f64, f64)>> + '_ {
    let width = 0.8 / count.max(1) as f64;
    values.iter().enumerate().map(move |(x, value)| {
        let left = x as f64 - 0.4 + slot as f64 * width;
        Rectangle::new([(left, 0.0), (left + width, *value)], color.filled())
    })
}

/// Palette entry as a plotters colour (black if the entry is not `#rrggbb`)
pub fn palette_color(custom: &Customization, index: usize) -> RGBColor {
    let (r, g, b) = hex_to_rgb(custom.color_at(index)).unwrap_or((0, 0, 0));
    RGBColor(r, g, b)
}

fn timestamps(map: &SeriesMap) -> Vec<String> {
    map.iter()
        .next()
        .map(|(_, series)| series.timestamps.clone())
        .unwrap_or_default()
}

fn indexed(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(x, y)| (x as f64, *y))
        .collect()
}

fn x_range(points: usize) -> Range<f64> {
    -0.5..(points.max(1) as f64 - 0.5)
}

/// Timestamp under tick `x`, empty between points
pub fn x_label(timestamps: &[String], x: f64) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 0.25 || nearest < 0.0 {
        return String::new();
    }
    timestamps.get(nearest as usize).cloned().unwrap_or_default()
}

/// Tick text with the configured prefix and suffix
pub fn y_label(value: f64, prefix: &str, suffix: &str) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{}{}{}", prefix, rounded, suffix)
}

fn y_suffix(custom: &Customization) -> String {
    if custom.chart_type == ChartType::Percent && custom.y_axis_suffix.is_empty() {
        "%".to_string()
    } else {
        custom.y_axis_suffix.clone()
    }
}

/// Low and high end of each bar segment when `columns` are stacked
///
/// Positive values grow upward from 0 and negative values downward, each
/// side accumulating on its own.
pub fn stack_segments(columns: &[Vec<f64>]) -> Vec<Vec<(f64, f64)>> {
    let points = columns.iter().map(Vec::len).max().unwrap_or(0);
    let mut up = vec![0.0; points];
    let mut down = vec![0.0; points];
    columns
        .iter()
        .map(|values| {
            values
                .iter()
                .enumerate()
                .map(|(x, value)| {
                    let base = if *value >= 0.0 { &mut up[x] } else { &mut down[x] };
                    let low = *base;
                    *base += value;
                    (low, *base)
                })
                .collect()
        })
        .collect()
}

/// Value extent of the primary axis for the named series
///
/// Stacked charts use the stacked totals; pinned min/max from the
/// customization override the data.
pub fn primary_bounds(map: &SeriesMap, custom: &Customization, names: &[&str]) -> (f64, f64) {
    let (low, high) = match custom.chart_type {
        ChartType::Stacked | ChartType::Percent => {
            let columns: Vec<Vec<f64>> = names
                .iter()
                .filter_map(|name| map.get(name))
                .map(|series| series.values.clone())
                .collect();
            stack_segments(&columns)
                .iter()
                .flatten()
                .fold((0.0f64, 0.0f64), |(lo, hi), (a, b)| {
                    (lo.min(*a).min(*b), hi.max(*a).max(*b))
                })
        }
        ChartType::Bar | ChartType::BarLine => {
            let (lo, hi) = series_bounds(map, names);
            (lo.min(0.0), hi.max(0.0))
        }
        ChartType::Line => {
            let (lo, hi) = series_bounds(map, names);
            (lo.min(0.0), hi)
        }
    };
    (
        custom.y_axis_min.unwrap_or(low),
        custom.y_axis_max.unwrap_or(high),
    )
}

/// Raw min and max over the named series, (0, 1) when there is no data
pub fn series_bounds(map: &SeriesMap, names: &[&str]) -> (f64, f64) {
    let mut values = names
        .iter()
        .filter_map(|name| map.get(name))
        .flat_map(|series| series.values.iter().copied())
        .peekable();
    if values.peek().is_none() {
        return (0.0, 1.0);
    }
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Turns a value extent into a drawable range with a little headroom
fn padded((low, high): (f64, f64)) -> Range<f64> {
    if high <= low {
        return low..low + 1.0;
    }
    let pad = (high - low) * 0.05;
    let low = if low == 0.0 { 0.0 } else { low - pad };
    low..high + pad
}
