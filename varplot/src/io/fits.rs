//! FITS binary table reader
//!
//! Reads the first binary-table HDU of a FITS file into a [`ColumnTable`].
//! String-valued columns (`uuid`, epoch labels) stay text, everything else is
//! read as double precision.

use std::path::Path;

use fitsio::hdu::HduInfo;
use fitsio::tables::ColumnDataType;
use fitsio::FitsFile;

use super::columns::{Column, ColumnTable};
use crate::error::{PlotError, Result};

/// Read the first table HDU of `path`
pub fn read_fits_table(path: &Path) -> Result<ColumnTable> {
    let fits_err = |e: fitsio::errors::Error| PlotError::Fits {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut fptr = FitsFile::open(path).map_err(fits_err)?;

    let mut hdu_idx = 0;
    loop {
        let hdu = fptr.hdu(hdu_idx).map_err(|_| PlotError::Fits {
            path: path.to_path_buf(),
            message: "no binary table HDU found".to_string(),
        })?;

        let descriptions = match &hdu.info {
            HduInfo::TableInfo {
                column_descriptions,
                ..
            } => column_descriptions.clone(),
            _ => {
                hdu_idx += 1;
                continue;
            }
        };

        let mut names = Vec::with_capacity(descriptions.len());
        let mut columns = Vec::with_capacity(descriptions.len());
        for description in descriptions {
            let column = match description.data_type.typ {
                ColumnDataType::String => Column::Text(
                    hdu.read_col::<String>(&mut fptr, &description.name)
                        .map_err(fits_err)?,
                ),
                _ => Column::Float(
                    hdu.read_col::<f64>(&mut fptr, &description.name)
                        .map_err(fits_err)?,
                ),
            };
            names.push(description.name);
            columns.push(column);
        }

        return Ok(ColumnTable::new(
            path.display().to_string(),
            names,
            columns,
        ));
    }
}
