//! ru_istp: dimension and relationship inference for ISTP-annotated data
//!
//! CDF files following the ISTP metadata guidelines describe their variables
//! as unnamed n-dimensional arrays plus pointer attributes (`DEPEND_<n>`,
//! `LABL_PTR_<n>`, `DELTA_PLUS_VAR`/`DELTA_MINUS_VAR`). This library reads
//! such a file through a [`CatalogSource`], works out which variables are
//! coordinates of which others, names every axis, and produces a labeled
//! [`Dataset`] of coordinates and data variables.
//!
//! ## Key Features
//!
//! - **Shared dimensions**: axes are named after their dependency variables
//!   and reused across variables of matching size
//! - **Time normalization**: `CDF_EPOCH`, `CDF_EPOCH16` and `CDF_TIME_TT2000`
//!   values convert to UTC calendar times or Unix seconds
//! - **Fill handling**: optional replacement of `FILLVAL` with missing values
//! - **Diagnostics**: inconsistent metadata never aborts a conversion
//! - **NetCDF**: read ISTP-annotated netCDF files and export the result
//!
//! ## Module Organization
//!
//! - [`catalog`]: reader abstraction and the materialized variable catalog
//! - [`normalize`] and [`epochs`]: time conversion and fill substitution
//! - [`relationships`]: dependency, label and uncertainty indexes
//! - [`dimensions`]: dimension naming and data reshaping
//! - [`dataset`]: assembly into coordinates and data variables
//! - [`metadata`]: terminal listings and JSON summaries
//! - [`netcdf_io`]: netCDF backend and export
//! - [`diagnostics`] and [`errors`]: non-fatal findings and fatal errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ru_istp::prelude::*;
//!
//! let options = ConversionOptions {
//!     to_datetime: true,
//!     ..Default::default()
//! };
//! let dataset = open_dataset("mms1_fpi_brst.nc", &options).unwrap();
//!
//! for (name, variable) in &dataset.coordinates {
//!     println!("{}: {:?}", name, variable.dims);
//! }
//! ```

pub mod catalog;
pub mod dataset;
pub mod diagnostics;
pub mod dimensions;
pub mod epochs;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;
pub mod normalize;
pub mod relationships;
pub mod types;

// Direct re-exports for the public API
pub use catalog::{Catalog, CatalogSource, MemorySource};
pub use dataset::{
    assemble, cdf_to_dataset, open_dataset, AssembledVariable, ConversionOptions, Dataset,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use errors::*;
pub use metadata::*;
pub use netcdf_io::{NetCDFSource, NetCDFWriter};
pub use normalize::TimeMode;
pub use types::{Attribute, Attributes, DataType, Values, VariableProperties, VariableRecord};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::catalog::{CatalogSource, MemorySource};
    pub use crate::dataset::{cdf_to_dataset, open_dataset, ConversionOptions, Dataset};
    pub use crate::diagnostics::{DiagnosticKind, Diagnostics};
    pub use crate::errors::{Result, RuIstpError};
    pub use crate::netcdf_io::{NetCDFSource, NetCDFWriter};
    pub use crate::types::{Attribute, DataType, Values, VariableProperties, VariableRecord};
}
