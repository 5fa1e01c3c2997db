//! Chart Renderer - AggregateTable to a PNG line chart
//!
//! ```text
//! ┌──────────────── title ────────────────┐
//! │ y ticks │ grid + one polyline per     │ legend
//! │         │ category, markers on cells  │
//! └─────────┴──── x: dates (MM-DD) ───────┘
//! ```
//!
//! Output depends only on the table, kind and label.

use super::kind::ReportKind;
use super::table::AggregateTable;
use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use std::io::Cursor;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;

/// DejaVu Sans: Latin and Cyrillic coverage for product names and labels
static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const MARGIN_LEFT: i32 = 90;
const MARGIN_RIGHT: i32 = 210;
const MARGIN_TOP: i32 = 70;
const MARGIN_BOTTOM: i32 = 70;
const Y_TICKS: u32 = 5;
const MARKER_RADIUS: i32 = 4;
const MIN_LABEL_SPACING: i32 = 56;
const LEGEND_ROW: i32 = 24;

const TITLE_SCALE: f32 = 26.0;
const CAPTION_SCALE: f32 = 16.0;
const TICK_SCALE: f32 = 13.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const TEXT: Rgb<u8> = Rgb([30, 30, 30]);

/// Series colours, reused cyclically
pub const PALETTE: [Rgb<u8>; 8] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([188, 189, 34]),
];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to plot: table has no dates")]
    NoDates,

    #[error("chart font unusable: {0}")]
    Font(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

pub(crate) fn chart_font() -> Result<FontRef<'static>, RenderError> {
    FontRef::try_from_slice(FONT_BYTES).map_err(|e| RenderError::Font(e.to_string()))
}

/// Chart title for a kind and period label
pub fn chart_title(kind: ReportKind, period_label: &str) -> String {
    format!("{} for {}", kind.title(), period_label)
}

/// Render one line series per category against date
pub fn render(
    table: &AggregateTable,
    kind: ReportKind,
    period_label: &str,
) -> Result<Vec<u8>, RenderError> {
    let dates = table.dates();
    let (first, last) = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(RenderError::NoDates),
    };

    let font = chart_font()?;
    let mut img = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, BACKGROUND);
    let plot = PlotArea::new();

    let max_value = table
        .rows()
        .iter()
        .map(|r| r.value)
        .fold(0.0_f64, f64::max);
    let (y_step, y_max) = y_scale(max_value);

    let span_days = (last - first).num_days();
    let x_of = |date: chrono::NaiveDate| -> i32 {
        if span_days == 0 {
            plot.left + plot.width() / 2
        } else {
            let offset = (date - first).num_days();
            plot.left + (plot.width() as i64 * offset / span_days) as i32
        }
    };
    let y_of = |value: f64| -> i32 {
        let ratio = if y_max > 0.0 { value / y_max } else { 0.0 };
        plot.bottom - (ratio * plot.height() as f64).round() as i32
    };

    // Horizontal grid + y tick labels
    for tick in 0..=Y_TICKS {
        let value = y_step * tick as f64;
        let y = y_of(value);
        segment(&mut img, (plot.left, y), (plot.right, y), GRID);
        let label = format_tick(value, y_step);
        let (w, h) = text_size(PxScale::from(TICK_SCALE), &font, &label);
        let (x, y) = (plot.left - 8 - w as i32, y - h as i32 / 2);
        draw_text_mut(&mut img, TEXT, x, y, TICK_SCALE, &font, &label);
    }

    // Vertical grid + date labels, thinned so labels never overlap
    let max_labels = (plot.width() / MIN_LABEL_SPACING).max(1) as usize;
    let label_every = (dates.len() + max_labels - 1) / max_labels;
    for (idx, date) in dates.iter().enumerate() {
        if idx % label_every.max(1) != 0 {
            continue;
        }
        let x = x_of(*date);
        segment(&mut img, (x, plot.top), (x, plot.bottom), GRID);
        let label = date.format("%m-%d").to_string();
        let (w, _) = text_size(PxScale::from(TICK_SCALE), &font, &label);
        let x = x - w as i32 / 2;
        draw_text_mut(&mut img, TEXT, x, plot.bottom + 10, TICK_SCALE, &font, &label);
    }

    // Axes
    segment(&mut img, (plot.left, plot.bottom), (plot.right, plot.bottom), AXIS);
    segment(&mut img, (plot.left, plot.top), (plot.left, plot.bottom), AXIS);

    // Series
    for (series_idx, category) in table.categories().iter().enumerate() {
        let color = PALETTE[series_idx % PALETTE.len()];
        let mut prev: Option<(i32, i32)> = None;

        for date in &dates {
            match table.value(category, *date) {
                Some(value) => {
                    let point = (x_of(*date), y_of(value));
                    if let Some(from) = prev {
                        thick_segment(&mut img, from, point, color);
                    }
                    prev = Some(point);
                }
                // Missing cell breaks the line
                None => prev = None,
            }
        }

        for date in &dates {
            if let Some(value) = table.value(category, *date) {
                let center = (x_of(*date), y_of(value));
                draw_filled_circle_mut(&mut img, center, MARKER_RADIUS, color);
            }
        }
    }

    // Title, axis captions, legend
    let title = chart_title(kind, period_label);
    let (title_w, _) = text_size(PxScale::from(TITLE_SCALE), &font, &title);
    let title_x = (CHART_WIDTH as i32 - title_w as i32).max(0) / 2;
    draw_text_mut(&mut img, TEXT, title_x, 22, TITLE_SCALE, &font, &title);

    let y_caption = kind.y_axis_label();
    draw_text_mut(&mut img, TEXT, plot.left - 60, plot.top - 26, CAPTION_SCALE, &font, y_caption);
    let (date_w, _) = text_size(PxScale::from(CAPTION_SCALE), &font, "Date");
    let date_x = plot.left + (plot.width() - date_w as i32) / 2;
    draw_text_mut(&mut img, TEXT, date_x, plot.bottom + 34, CAPTION_SCALE, &font, "Date");

    draw_legend(&mut img, &font, &plot, table.categories());

    encode_png(img)
}

struct PlotArea {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

impl PlotArea {
    fn new() -> Self {
        Self {
            left: MARGIN_LEFT,
            right: CHART_WIDTH as i32 - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: CHART_HEIGHT as i32 - MARGIN_BOTTOM,
        }
    }

    fn width(&self) -> i32 {
        self.right - self.left
    }

    fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// (tick step, axis maximum) covering `max_value` in `Y_TICKS` round steps
fn y_scale(max_value: f64) -> (f64, f64) {
    if !(max_value > 0.0) || !max_value.is_finite() {
        return (1.0, Y_TICKS as f64);
    }

    let raw = max_value / Y_TICKS as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };

    let step = nice * magnitude;
    (step, step * Y_TICKS as f64)
}

fn format_tick(value: f64, step: f64) -> String {
    if step >= 1.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn draw_legend(img: &mut RgbImage, font: &FontRef<'_>, plot: &PlotArea, categories: &[String]) {
    let x = plot.right + 20;
    let mut y = plot.top;
    for (idx, category) in categories.iter().enumerate() {
        if y + LEGEND_ROW > plot.bottom {
            break;
        }
        let color = PALETTE[idx % PALETTE.len()];
        draw_filled_rect_mut(img, Rect::at(x, y + 2).of_size(12, 12), color);
        draw_text_mut(img, TEXT, x + 20, y, CAPTION_SCALE, font, category);
        y += LEGEND_ROW;
    }
}

fn segment(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let from = (from.0 as f32, from.1 as f32);
    let to = (to.0 as f32, to.1 as f32);
    draw_line_segment_mut(img, from, to, color);
}

/// 2px pen: the segment plus copies shifted right and down
fn thick_segment(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    for (ox, oy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        segment(img, (from.0 + ox, from.1 + oy), (to.0 + ox, to.1 + oy), color);
    }
}

fn encode_png(img: RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(bytes)
}
