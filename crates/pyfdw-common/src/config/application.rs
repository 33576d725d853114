use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub python: PythonConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> CommonResult<Self> {
        Self::figment()
            .admerge(Env::prefixed("PYFDW__").map(|p| p.as_str().replace("__", ".").into()))
            .extract()
            .map_err(|e| CommonError::invalid(e.to_string()))
    }

    /// Loads the built-in defaults only, ignoring the environment.
    pub fn load_default() -> CommonResult<Self> {
        Self::figment()
            .extract()
            .map_err(|e| CommonError::invalid(e.to_string()))
    }

    fn figment() -> Figment {
        Figment::from(Toml::string(DEFAULT_CONFIG))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub wrapper_option: String,
    pub runtime_option: String,
    pub default_runtime: String,
    pub iteration_fault: IterationFaultPolicy,
    pub rescan: RescanPolicy,
}

/// How the scan reacts when the wrapper raises while producing the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterationFaultPolicy {
    /// Log the fault and report end of data.
    EndOfData,
    /// Surface the fault as a scan error.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RescanPolicy {
    /// Reset the row counter and keep pulling from the current sequence.
    CounterOnly,
    /// Restart the wrapper and pull from a fresh sequence.
    Rebuild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    pub class_factory: String,
    pub produce_method: String,
    pub forward_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub default_log_filter: String,
}
