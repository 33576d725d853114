use log::{debug, warn};
use pyfdw_common::config::PythonConfig;
use pyfdw_scan::{Advance, RowSequence, RuntimeBridge, ScanError, ScanResult, WrapperIdentity};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyIterator};

use crate::conversion::py_to_record;
use crate::error::{format_py_err, PyBridgeError, PyBridgeResult};
use crate::runtime::{RuntimeLease, RuntimeSession};

/// Starts wrapper classes inside the embedded Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonBridge {
    config: PythonConfig,
}

impl PythonBridge {
    pub const NAME: &'static str = "python";

    pub fn new(config: PythonConfig) -> Self {
        Self { config }
    }

    fn produce(
        &self,
        py: Python<'_>,
        identity: &WrapperIdentity,
    ) -> PyBridgeResult<Py<PyIterator>> {
        let module = py.import(identity.module())?;
        let class = self.resolve_class(&module, identity)?;
        let options = PyDict::new(py);
        for (key, value) in identity.config() {
            options.set_item(key, value)?;
        }
        let wrapper = class.call1((options,))?;
        let rows = wrapper.call_method0(self.config.produce_method.as_str())?;
        Ok(rows.try_iter()?.unbind())
    }

    /// Looks up the class on the module, then falls back to the module's class factory
    /// called with the full wrapper path.
    fn resolve_class<'py>(
        &self,
        module: &Bound<'py, PyModule>,
        identity: &WrapperIdentity,
    ) -> PyBridgeResult<Bound<'py, PyAny>> {
        if let Ok(class) = module.getattr(identity.class()) {
            return Ok(class);
        }
        match module.getattr(self.config.class_factory.as_str()) {
            Ok(factory) => {
                debug!(
                    "resolving {} with {}.{}",
                    identity.path(),
                    identity.module(),
                    self.config.class_factory
                );
                Ok(factory.call1((identity.path(),))?)
            }
            Err(_) => Err(PyBridgeError::resolution(format!(
                "module {} has neither a class named {} nor a {} function",
                identity.module(),
                identity.class(),
                self.config.class_factory
            ))),
        }
    }
}

impl RuntimeBridge for PythonBridge {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn start(
        &self,
        identity: &WrapperIdentity,
        columns: &[String],
    ) -> ScanResult<Box<dyn RowSequence>> {
        let lease = RuntimeSession::acquire(&self.config)?;
        // The lease is released on drop if the wrapper cannot be started.
        let iterator = Python::with_gil(|py| self.produce(py, identity))?;
        debug!("started Python wrapper {identity}");
        Ok(Box::new(PythonRowSequence {
            wrapper: identity.path(),
            columns: columns.to_vec(),
            iterator: Some(iterator),
            lease: Some(lease),
        }))
    }
}

struct PythonRowSequence {
    wrapper: String,
    columns: Vec<String>,
    iterator: Option<Py<PyIterator>>,
    lease: Option<RuntimeLease>,
}

impl PythonRowSequence {
    fn finish(&mut self) {
        if let Some(iterator) = self.iterator.take() {
            Python::with_gil(|_| drop(iterator));
        }
    }
}

impl RowSequence for PythonRowSequence {
    fn advance(&mut self) -> ScanResult<Advance> {
        let Some(iterator) = self.iterator.as_ref() else {
            return Ok(Advance::EndOfSequence);
        };
        let columns = &self.columns;
        let next = Python::with_gil(|py| -> Option<Result<PyBridgeResult<_>, PyErr>> {
            let next = iterator.bind(py).clone().next()?;
            Some(next.map(|row| py_to_record(&row, columns)))
        });
        match next {
            Some(Ok(Ok(record))) => Ok(Advance::Row(record)),
            Some(Ok(Err(e))) => Err(match e {
                PyBridgeError::PythonError(e) => ScanError::marshalling(format!(
                    "cannot read row from {}: {}",
                    self.wrapper,
                    format_py_err(&e)
                )),
                e => e.into(),
            }),
            Some(Err(e)) => {
                self.finish();
                let message = format_py_err(&e);
                warn!("Python wrapper {} raised while producing rows", self.wrapper);
                Ok(Advance::RuntimeFault(message))
            }
            None => {
                self.finish();
                Ok(Advance::EndOfSequence)
            }
        }
    }

    fn stop(&mut self) {
        self.finish();
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
    }
}

impl Drop for PythonRowSequence {
    fn drop(&mut self) {
        self.stop();
    }
}
