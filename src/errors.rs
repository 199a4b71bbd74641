//! Centralized error handling for ru_istp
//!
//! Only a handful of conditions are fatal: the file cannot be opened or read,
//! an array cannot be built with the requested shape, or a summary cannot be
//! serialized. Everything the metadata gets wrong is reported as a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) instead.

use std::fmt;

/// Main error type for ru_istp operations
#[derive(Debug)]
pub enum RuIstpError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Variable not found in the catalog
    VariableNotFound { var: String },

    /// A catalog source could not produce a variable's record
    SourceError { var: String, message: String },

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// JSON serialization error
    JsonError(serde_json::Error),

    /// Generic error for everything else
    Generic(String),
}

impl fmt::Display for RuIstpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuIstpError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            RuIstpError::IoError(e) => write!(f, "I/O error: {}", e),
            RuIstpError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            RuIstpError::SourceError { var, message } => {
                write!(f, "Failed to read variable '{}': {}", var, message)
            }
            RuIstpError::ArrayError(e) => write!(f, "Array error: {}", e),
            RuIstpError::JsonError(e) => write!(f, "JSON error: {}", e),
            RuIstpError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RuIstpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuIstpError::NetCDFError(e) => Some(e),
            RuIstpError::IoError(e) => Some(e),
            RuIstpError::ArrayError(e) => Some(e),
            RuIstpError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for RuIstpError {
    fn from(error: netcdf::Error) -> Self {
        RuIstpError::NetCDFError(error)
    }
}

impl From<std::io::Error> for RuIstpError {
    fn from(error: std::io::Error) -> Self {
        RuIstpError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for RuIstpError {
    fn from(error: ndarray::ShapeError) -> Self {
        RuIstpError::ArrayError(error)
    }
}

impl From<serde_json::Error> for RuIstpError {
    fn from(error: serde_json::Error) -> Self {
        RuIstpError::JsonError(error)
    }
}

impl From<String> for RuIstpError {
    fn from(error: String) -> Self {
        RuIstpError::Generic(error)
    }
}

impl From<&str> for RuIstpError {
    fn from(error: &str) -> Self {
        RuIstpError::Generic(error.to_string())
    }
}

/// Result type alias for ru_istp operations
pub type Result<T> = std::result::Result<T, RuIstpError>;
