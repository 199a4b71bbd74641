//! Defines command-line interface options using `clap` for the ru-istp application.

use clap::Parser;
use std::path::PathBuf;

use ru_istp::ConversionOptions;

/// A CLI tool for turning ISTP-annotated files into labeled datasets
#[derive(Parser, Debug)]
#[command(
    version,
    name = "ru-istp",
    about = "Infer dimensions, coordinates and data variables from ISTP metadata"
)]
pub struct Args {
    /// Path to the input file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Convert CDF time values to UTC calendar times
    #[arg(long)]
    pub to_datetime: bool,

    /// Convert CDF time values to seconds since 1970-01-01 (wins over --to-datetime)
    #[arg(long)]
    pub to_unixtime: bool,

    /// Replace FILLVAL elements of floating point and time variables with missing values
    #[arg(long)]
    pub fillval_to_nan: bool,

    /// List all dimensions, coordinates and data variables
    #[arg(long)]
    pub list_vars: bool,

    /// Describe a specific variable (role, dimensions, shape and attributes)
    #[arg(long)]
    pub describe: Option<String>,

    /// Print a JSON summary of the dataset structure
    #[arg(long)]
    pub json: bool,

    /// Path to export the labeled dataset as NetCDF
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn conversion_options(&self) -> ConversionOptions {
        ConversionOptions {
            to_datetime: self.to_datetime,
            to_unixtime: self.to_unixtime,
            fillval_to_nan: self.fillval_to_nan,
        }
    }
}
