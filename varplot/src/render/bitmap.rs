//! PNG rendering with plotters.
//!
//! Light curves are error-bar line plots of flux density against date or epoch.
//! The summary is a scatter of log p-value against debiased modulation index,
//! coloured by mean flux, with the "not variable" regions shaded.

use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::colormap::Colormap;
use super::style::PlotStyle;
use super::PlotRenderer;
use crate::error::{PlotError, Result};
use crate::model::{CurveAxis, CurvePoint, LightCurve};
use crate::summary::SummaryData;
use crate::time_parse::format_plot_seconds;

const FONT: &str = "sans-serif";
pub(crate) const COLORBAR_WIDTH: i32 = 130;
const COLORBAR_STEPS: usize = 200;
const SECONDS_PER_DAY: f64 = 86_400.0;
const ANNOTATION_WIDTH: i32 = 150;
const ANNOTATION_MARGIN: i32 = 40;
const ANNOTATION_TOP: i32 = 60;

/// Writes PNG images using the configured [`PlotStyle`]
#[derive(Debug, Clone, Default)]
pub struct BitmapRenderer {
    style: PlotStyle,
}

impl BitmapRenderer {
    pub fn new(style: PlotStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &PlotStyle {
        &self.style
    }

    fn draw_light_curve(&self, curve: &LightCurve, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
        let style = &self.style.light_curve;
        let font_size = style.font_size as i32;

        let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let points: Vec<&CurvePoint> = curve.finite_points().collect();
        let (x_range, y_range) = curve_bounds(&points, curve.axis);
        let axis = curve.axis;

        let mut chart = ChartBuilder::on(&root)
            .caption(&curve.uuid, (FONT, font_size + 4))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_desc(match axis {
                CurveAxis::Date => "Date",
                CurveAxis::EpochIndex => "Epoch",
            })
            .y_desc("Flux Density (Jy/Beam)")
            .x_labels(6)
            .x_label_formatter(&|x| format_x_label(axis, *x))
            .y_label_formatter(&|y| format!("{y:.3}"))
            .label_style((FONT, font_size - 4))
            .axis_desc_style((FONT, font_size))
            .draw()?;

        chart.draw_series(points.iter().map(|p| {
            let err = if p.err.is_finite() { p.err.abs() } else { 0.0 };
            ErrorBar::new_vertical(p.x, p.flux - err, p.flux, p.flux + err, BLUE.filled(), 8)
        }))?;

        chart.draw_series(LineSeries::new(
            points.iter().map(|p| (p.x, p.flux)),
            BLUE.stroke_width(2),
        ))?;

        draw_annotation(&root, &curve.annotation.lines(), style.width as i32, font_size - 4)?;

        root.present()?;
        Ok(())
    }

    fn draw_summary(&self, summary: &SummaryData, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
        let style = &self.style.summary;
        let font_size = style.font_size as i32;
        let (md_min, md_max) = style.md_range;
        let (lp_min, lp_max) = style.log_pval_range;
        let log_threshold = style.pval_threshold.log10();
        let md_threshold = style.md_threshold;

        let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let (plot_area, bar_area) =
            root.split_horizontally(style.width as i32 - COLORBAR_WIDTH);

        let mut chart = ChartBuilder::on(&plot_area)
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(md_min..md_max, lp_min..lp_max)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Debiased modulation index (md)")
            .y_desc(summary.pval_axis_label())
            .label_style((FONT, font_size - 4))
            .axis_desc_style((FONT, font_size))
            .draw()?;

        let shade = BLACK.mix(0.2).filled();
        chart.draw_series(std::iter::once(Rectangle::new(
            [(md_min, lp_min), (md_threshold, lp_max)],
            shade,
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(md_threshold, log_threshold), (md_max, lp_max)],
            shade,
        )))?;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(md_min, log_threshold), (md_max, log_threshold)],
            BLACK,
        )))?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(md_threshold, lp_min), (md_threshold, lp_max)],
            BLACK,
        )))?;

        let label_y = log_threshold - 2.0;
        chart.draw_series(std::iter::once(Text::new(
            "variable",
            (md_threshold + 0.25 * (md_max - md_threshold), label_y),
            (FONT, font_size).into_font(),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            "not variable",
            (md_min + 0.1 * (md_threshold - md_min), label_y),
            (FONT, font_size).into_font(),
        )))?;

        let cmap = Colormap::spanning(summary.points.iter().map(|p| p.log_mean_flux), true);
        chart.draw_series(
            summary
                .points
                .iter()
                .filter(|p| p.md.is_finite() && p.log_pval.is_finite())
                .map(|p| Circle::new((p.md, p.log_pval), 4, cmap.color(p.log_mean_flux).filled())),
        )?;

        draw_colorbar(&bar_area, &cmap, font_size)?;

        root.present()?;
        Ok(())
    }
}

impl PlotRenderer for BitmapRenderer {
    fn render_light_curve(&self, curve: &LightCurve, path: &Path) -> Result<()> {
        self.draw_light_curve(curve, path)
            .map_err(|e| PlotError::Drawing {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    fn render_summary(&self, summary: &SummaryData, path: &Path) -> Result<()> {
        self.draw_summary(summary, path)
            .map_err(|e| PlotError::Drawing {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

/// Multi-line legend box in the upper right corner, one statistic per line
fn draw_annotation(
    area: &DrawingArea<BitMapBackend, Shift>,
    lines: &[String],
    width: i32,
    font_size: i32,
) -> std::result::Result<(), Box<dyn Error>> {
    let line_height = font_size + 4;
    let (right, top) = (width - ANNOTATION_MARGIN, ANNOTATION_TOP);
    let left = right - ANNOTATION_WIDTH;
    let bottom = top + line_height * lines.len() as i32 + 8;

    area.draw(&Rectangle::new([(left, top), (right, bottom)], WHITE.mix(0.8).filled()))?;
    area.draw(&Rectangle::new([(left, top), (right, bottom)], BLACK))?;
    area.draw(&PathElement::new(
        vec![(left + 6, top + 4 + line_height / 2), (left + 26, top + 4 + line_height / 2)],
        BLUE.stroke_width(2),
    ))?;
    for (i, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.as_str(),
            (left + 32, top + 4 + line_height * i as i32),
            (FONT, font_size).into_font(),
        ))?;
    }
    Ok(())
}

/// Vertical gradient with a value axis for the summary colours
fn draw_colorbar(
    area: &DrawingArea<BitMapBackend, Shift>,
    cmap: &Colormap,
    font_size: i32,
) -> std::result::Result<(), Box<dyn Error>> {
    let (lo, hi) = cmap.range();

    let mut bar = ChartBuilder::on(area)
        .margin_top(15)
        .margin_bottom(65)
        .margin_left(5)
        .margin_right(5)
        .x_label_area_size(0)
        .y_label_area_size(75)
        .build_cartesian_2d(0.0..1.0, lo..hi)?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc("log10(Peak flux in epoch 1) (Jy)")
        .y_label_formatter(&|y| format!("{y:.1}"))
        .label_style((FONT, font_size - 6))
        .axis_desc_style((FONT, font_size - 4))
        .draw()?;

    let step = (hi - lo) / COLORBAR_STEPS as f64;
    bar.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y0 = lo + step * i as f64;
        let y1 = y0 + step;
        Rectangle::new([(0.0, y0), (1.0, y1)], cmap.color(0.5 * (y0 + y1)).filled())
    }))?;

    Ok(())
}

/// Axis bounds covering every point and its error bar, padded by 5%
fn curve_bounds(
    points: &[&CurvePoint],
    axis: CurveAxis,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    if points.is_empty() {
        return (0.0..1.0, 0.0..1.0);
    }

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        let err = if p.err.is_finite() { p.err.abs() } else { 0.0 };
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.flux - err);
        y_max = y_max.max(p.flux + err);
    }

    let x_pad = if x_max > x_min {
        (x_max - x_min) * 0.05
    } else {
        match axis {
            CurveAxis::Date => SECONDS_PER_DAY,
            CurveAxis::EpochIndex => 1.0,
        }
    };
    let y_pad = if y_max > y_min {
        (y_max - y_min) * 0.05
    } else {
        y_max.abs().max(1.0) * 0.1
    };

    (x_min - x_pad..x_max + x_pad, y_min - y_pad..y_max + y_pad)
}

fn format_x_label(axis: CurveAxis, x: f64) -> String {
    match axis {
        CurveAxis::Date => format_plot_seconds(x, "%Y-%m-%d"),
        CurveAxis::EpochIndex => format!("{x:.0}"),
    }
}
