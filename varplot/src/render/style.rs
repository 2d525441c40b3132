//! Plot style configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::bitmap::COLORBAR_WIDTH;
use crate::error::{PlotError, Result};

/// Sizing for individual light-curve plots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCurveStyle {
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
}

impl Default for LightCurveStyle {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            font_size: 18,
        }
    }
}

/// Layout and decision boundaries of the variability summary plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryStyle {
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    /// Horizontal extent, debiased modulation index
    pub md_range: (f64, f64),
    /// Vertical extent, log10 of the p-value
    pub log_pval_range: (f64, f64),
    /// Sources below this p-value are candidates for variability
    pub pval_threshold: f64,
    /// Sources above this modulation index are candidates for variability
    pub md_threshold: f64,
}

impl Default for SummaryStyle {
    fn default() -> Self {
        Self {
            width: 600,
            height: 900,
            font_size: 18,
            md_range: (-0.3, 0.3),
            log_pval_range: (-11.0, 1.001),
            pval_threshold: 1e-3,
            md_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub light_curve: LightCurveStyle,
    pub summary: SummaryStyle,
}

impl PlotStyle {
    /// Load a style from a JSON file; omitted fields keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PlotError::io(path, e))?;
        let style: PlotStyle =
            serde_json::from_str(&contents).map_err(|e| PlotError::Style {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        style.validate(path)?;
        Ok(style)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| {
            Err(PlotError::Style {
                path: path.to_path_buf(),
                message: message.to_string(),
            })
        };

        let s = &self.summary;
        if s.md_range.0 >= s.md_range.1 || s.log_pval_range.0 >= s.log_pval_range.1 {
            return invalid("axis ranges must be increasing");
        }
        if s.pval_threshold <= 0.0 {
            return invalid("pval_threshold must be positive");
        }
        if self.light_curve.width == 0 || self.light_curve.height == 0 || s.width == 0 || s.height == 0
        {
            return invalid("image sizes must be non-zero");
        }
        if i64::from(s.width) <= i64::from(COLORBAR_WIDTH) {
            return invalid("summary width must leave room for the colorbar");
        }
        Ok(())
    }
}
