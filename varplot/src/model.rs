//! Core data types: per-source statistics, flux rows and rendered light curves.

/// Per-source variability statistics computed upstream
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    pub uuid: String,
    /// Slope of a linear fit to the light curve
    pub m: f64,
    /// Debiased modulation index
    pub md: f64,
    pub chisq_peak_flux: f64,
    /// Variability p-value (`pval_peak_flux` or `pval_peak_flux_ks`)
    pub pval: f64,
    pub mean_peak_flux: f64,
}

impl StatsRecord {
    pub fn annotation(&self) -> StatsAnnotation {
        StatsAnnotation {
            m: self.m,
            md: self.md,
            chisq: self.chisq_peak_flux,
        }
    }
}

/// One flux measurement of a source in a single epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMeasurement {
    pub label: String,
    pub peak_flux: f64,
    pub err_peak_flux: f64,
}

/// One row of the flux table, with the three column families kept in column order
#[derive(Debug, Clone, PartialEq)]
pub struct FluxRow {
    pub uuid: String,
    /// Epoch labels, empty when the table has no `epoch*` columns
    pub epochs: Vec<String>,
    pub fluxes: Vec<f64>,
    pub errors: Vec<f64>,
}

impl FluxRow {
    /// Measurements in storage order, labelled with the epoch timestamp or the column index
    pub fn measurements(&self) -> Vec<EpochMeasurement> {
        self.fluxes
            .iter()
            .zip(&self.errors)
            .enumerate()
            .map(|(i, (&peak_flux, &err_peak_flux))| EpochMeasurement {
                label: self.epochs.get(i).cloned().unwrap_or_else(|| i.to_string()),
                peak_flux,
                err_peak_flux,
            })
            .collect()
    }
}

/// What the x coordinate of a light curve means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveAxis {
    /// Seconds since the Unix epoch
    Date,
    /// Epoch number or column index
    EpochIndex,
}

/// Statistics printed in the light-curve legend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsAnnotation {
    pub m: f64,
    pub md: f64,
    pub chisq: f64,
}

impl StatsAnnotation {
    /// One legend line per statistic
    pub fn lines(&self) -> [String; 3] {
        [
            format!("m={:5.3}", self.m),
            format!("md={:4.2}", self.md),
            format!("chisq={:4.1}", self.chisq),
        ]
    }

    pub fn label(&self) -> String {
        self.lines().join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub x: f64,
    pub flux: f64,
    pub err: f64,
}

/// A light curve ready to be drawn; points are in plotting order
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurve {
    pub uuid: String,
    pub axis: CurveAxis,
    pub points: Vec<CurvePoint>,
    pub annotation: StatsAnnotation,
}

impl LightCurve {
    /// Points whose flux and error can actually be drawn
    pub fn finite_points(&self) -> impl Iterator<Item = &CurvePoint> {
        self.points
            .iter()
            .filter(|p| p.x.is_finite() && p.flux.is_finite())
    }
}
