use pyfdw_scan::ScanError;
use pyo3::prelude::*;
use pyo3::{intern, PyErr};
use thiserror::Error;

pub type PyBridgeResult<T> = Result<T, PyBridgeError>;

#[derive(Debug, Error)]
pub enum PyBridgeError {
    #[error("error in Python: {0}")]
    PythonError(#[from] PyErr),
    #[error("cannot resolve wrapper: {0}")]
    ResolutionError(String),
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl PyBridgeError {
    pub fn resolution(message: impl Into<String>) -> Self {
        PyBridgeError::ResolutionError(message.into())
    }

    pub fn invalid_row(message: impl Into<String>) -> Self {
        PyBridgeError::InvalidRow(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PyBridgeError::InternalError(message.into())
    }
}

impl From<PyBridgeError> for ScanError {
    fn from(error: PyBridgeError) -> Self {
        match error {
            PyBridgeError::PythonError(e) => ScanError::Resolution(format_py_err(&e)),
            PyBridgeError::ResolutionError(message) => ScanError::Resolution(message),
            PyBridgeError::InvalidRow(message) => ScanError::Marshalling(message),
            PyBridgeError::InternalError(message) => ScanError::Internal(message),
        }
    }
}

/// Formats a Python exception with its traceback.
/// Falls back to the exception text when the traceback cannot be formatted.
pub fn format_py_err(e: &PyErr) -> String {
    let info = Python::with_gil(|py| -> PyResult<Vec<String>> {
        let traceback = PyModule::import(py, intern!(py, "traceback"))?;
        let format_exception = traceback.getattr(intern!(py, "format_exception"))?;
        format_exception.call1((e,))?.extract()
    });
    match info {
        // Each line already ends with a newline character.
        Ok(info) if !info.is_empty() => info.join("").trim_end().to_string(),
        _ => e.to_string(),
    }
}
