use std::ffi::CString;

use log::{error, logger, Level, LevelFilter, MetadataBuilder, Record};
use pyo3::prelude::*;
use pyo3::{intern, pyclass, pymethods};

const MODULE_NAME: &str = "_pyfdw_native_logging";
const MODULE_FILE_NAME: &str = "native_logging.py";
const MODULE_SOURCE_CODE: &str = include_str!("python/native_logging.py");

/// Routes records of the Python root logger to the Rust logger under the
/// `python::<logger name>` target. Installing it more than once is a no-op.
///
/// The root logger level follows the native max level, unless native logging is off,
/// in which case the root logger level is left unchanged.
pub(crate) fn install_log_forwarding(py: Python<'_>) -> PyResult<()> {
    let m = PyModule::from_code(
        py,
        CString::new(MODULE_SOURCE_CODE)?.as_c_str(),
        CString::new(MODULE_FILE_NAME)?.as_c_str(),
        CString::new(MODULE_NAME)?.as_c_str(),
    )?;
    m.add_class::<NativeLogging>()?;
    let emit = m
        .getattr(intern!(py, "NativeLogging"))?
        .getattr(intern!(py, "emit"))?;
    let installed: bool = m
        .getattr(intern!(py, "install"))?
        .call1((emit, python_level(log::max_level())))?
        .extract()?;
    if installed {
        log::debug!("forwarding Python logging to the native logger");
    }
    Ok(())
}

/// The Python logging level matching the native filter.
fn python_level(filter: LevelFilter) -> Option<u8> {
    match filter {
        LevelFilter::Off => None,
        LevelFilter::Error => Some(40),
        LevelFilter::Warn => Some(30),
        LevelFilter::Info => Some(20),
        LevelFilter::Debug => Some(10),
        LevelFilter::Trace => Some(1),
    }
}

fn native_level(level: u8) -> Level {
    if level >= 40u8 {
        Level::Error
    } else if level >= 30u8 {
        Level::Warn
    } else if level >= 20u8 {
        Level::Info
    } else if level >= 10u8 {
        Level::Debug
    } else {
        Level::Trace
    }
}

#[pyclass]
struct NativeLogging;

impl NativeLogging {
    fn try_emit(record: Bound<'_, PyAny>) -> PyResult<()> {
        let level = record.getattr("levelno")?.extract::<u8>()?;
        let message = record.getattr("getMessage")?.call0()?.extract::<String>()?;
        let pathname = record.getattr("pathname")?.extract::<String>()?;
        let line = record.getattr("lineno")?.extract::<u32>()?;
        let name = record.getattr("name")?.extract::<String>()?;

        let target = name.trim();
        let target = if target.is_empty() || target == "root" {
            "python".to_string()
        } else {
            format!("python::{}", target.replace('.', "::"))
        };
        let metadata = MetadataBuilder::new()
            .target(&target)
            .level(native_level(level))
            .build();

        logger().log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("{}", &message))
                .line(Some(line))
                .file(Some(&pathname))
                .module_path(Some(&pathname))
                .build(),
        );
        Ok(())
    }
}

#[pymethods]
impl NativeLogging {
    #[staticmethod]
    fn emit(record: Bound<'_, PyAny>) {
        if let Err(e) = Self::try_emit(record) {
            error!("failed to emit Python log record: {e}");
        }
    }
}
