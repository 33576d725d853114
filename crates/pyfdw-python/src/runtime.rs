use std::sync::Mutex;

use log::{debug, warn};
use pyfdw_common::config::PythonConfig;
use pyo3::prelude::*;
use pyo3::intern;

use crate::error::{PyBridgeError, PyBridgeResult};
use crate::logging::install_log_forwarding;

enum SessionStatus {
    Uninitialized,
    Active { leases: usize },
    Idle,
}

static SESSION_STATUS: Mutex<SessionStatus> = Mutex::new(SessionStatus::Uninitialized);

/// The process-wide embedded Python session.
///
/// Every started wrapper holds a [`RuntimeLease`]. The interpreter is initialized when
/// the first lease is taken and the session is torn down when the last lease is released.
/// The interpreter itself stays alive for the rest of the process since CPython does not
/// support being initialized again after finalization.
pub struct RuntimeSession;

impl RuntimeSession {
    pub fn acquire(config: &PythonConfig) -> PyBridgeResult<RuntimeLease> {
        pyo3::prepare_freethreaded_python();
        let first = {
            let mut status = SESSION_STATUS
                .lock()
                .map_err(|e| PyBridgeError::internal(e.to_string()))?;
            match *status {
                SessionStatus::Uninitialized => {
                    *status = SessionStatus::Active { leases: 1 };
                    true
                }
                SessionStatus::Active { ref mut leases } => {
                    *leases += 1;
                    false
                }
                SessionStatus::Idle => {
                    *status = SessionStatus::Active { leases: 1 };
                    debug!("Python runtime session resumed");
                    false
                }
            }
        };
        // Python is called outside the lock so that a thread holding the GIL
        // never waits on the session status.
        if first {
            debug!("Python runtime session initialized");
            if config.forward_logging {
                if let Err(e) = Python::with_gil(install_log_forwarding) {
                    warn!("failed to forward Python logging: {e}");
                }
            }
        }
        Ok(RuntimeLease { released: false })
    }

    /// The number of leases currently held across the process.
    pub fn active_leases() -> usize {
        match SESSION_STATUS.lock() {
            Ok(status) => match *status {
                SessionStatus::Active { leases } => leases,
                SessionStatus::Uninitialized | SessionStatus::Idle => 0,
            },
            Err(_) => 0,
        }
    }

    fn release() {
        let last = match SESSION_STATUS.lock() {
            Ok(mut status) => match *status {
                SessionStatus::Active { leases } if leases > 1 => {
                    *status = SessionStatus::Active { leases: leases - 1 };
                    false
                }
                SessionStatus::Active { .. } => {
                    *status = SessionStatus::Idle;
                    true
                }
                SessionStatus::Uninitialized | SessionStatus::Idle => false,
            },
            Err(e) => {
                warn!("failed to release Python runtime session: {e}");
                false
            }
        };
        if last {
            Self::teardown();
        }
    }

    fn teardown() {
        let result = Python::with_gil(|py| -> PyResult<usize> {
            py.import(intern!(py, "gc"))?
                .call_method0(intern!(py, "collect"))?
                .extract()
        });
        match result {
            Ok(collected) => {
                debug!("Python runtime session idle, {collected} objects collected")
            }
            Err(e) => warn!("failed to tear down Python runtime session: {e}"),
        }
    }
}

/// A share of the embedded Python session, released on drop.
#[derive(Debug)]
pub struct RuntimeLease {
    released: bool,
}

impl RuntimeLease {
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            RuntimeSession::release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for RuntimeLease {
    fn drop(&mut self) {
        self.release();
    }
}
