//! Variability summary: p-value against modulation index for every source.
//!
//! Only sources with a strictly positive p-value can be placed on the log axis;
//! everything else is dropped and counted. Each kept source is classified as
//! variable when its p-value is below the threshold and its modulation index
//! above it.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::io::StatsTable;
use crate::render::{PlotRenderer, SummaryStyle};

/// One source on the summary plot
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPoint {
    pub uuid: String,
    pub md: f64,
    pub log_pval: f64,
    /// log10 of the absolute mean peak flux, used for colour
    pub log_mean_flux: f64,
    pub variable: bool,
}

/// Everything the summary renderer draws
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryData {
    pub points: Vec<SummaryPoint>,
    /// Rows dropped for a non-positive or non-finite p-value
    pub excluded: usize,
    /// Source column of the p-values, shown in the axis label
    pub pval_column: String,
    pub pval_threshold: f64,
    pub md_threshold: f64,
}

impl SummaryData {
    pub fn from_stats(stats: &StatsTable, style: &SummaryStyle) -> Self {
        let mut excluded = 0;
        let mut points = Vec::with_capacity(stats.len());

        for record in stats.records() {
            if !(record.pval > 0.0 && record.pval.is_finite()) {
                excluded += 1;
                continue;
            }
            points.push(SummaryPoint {
                uuid: record.uuid.clone(),
                md: record.md,
                log_pval: record.pval.log10(),
                log_mean_flux: record.mean_peak_flux.abs().log10(),
                variable: record.pval < style.pval_threshold && record.md > style.md_threshold,
            });
        }

        Self {
            points,
            excluded,
            pval_column: stats.pval_column().to_string(),
            pval_threshold: style.pval_threshold,
            md_threshold: style.md_threshold,
        }
    }

    pub fn variable_count(&self) -> usize {
        self.points.iter().filter(|p| p.variable).count()
    }

    /// Label for the y axis, e.g. `log(p_val_ks)`
    pub fn pval_axis_label(&self) -> String {
        let suffix = self
            .pval_column
            .strip_prefix("pval_peak_flux")
            .unwrap_or_default();
        format!("log(p_val{suffix})")
    }
}

/// Build the summary from `stats` and draw it to `path`
pub fn render_summary(
    stats: &StatsTable,
    style: &SummaryStyle,
    renderer: &dyn PlotRenderer,
    path: &Path,
) -> Result<SummaryData> {
    let summary = SummaryData::from_stats(stats, style);
    info!(
        "Summary: {} sources plotted, {} excluded, {} variable",
        summary.points.len(),
        summary.excluded,
        summary.variable_count()
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| crate::PlotError::io(parent, e))?;
    }
    renderer.render_summary(&summary, path)?;
    Ok(summary)
}
