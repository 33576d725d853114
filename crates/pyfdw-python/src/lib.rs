//! The Python runtime bridge.
//!
//! A wrapper is a Python class that takes the foreign table options as a `dict` and
//! produces rows from a zero-argument method:
//!
//! ```python
//! class CsvWrapper:
//!     def __init__(self, options: dict):
//!         self.path = options["path"]
//!
//!     def execute(self) -> Iterator[Mapping[str, Any]]:
//!         """Yield one mapping per row, keyed by column name."""
//! ```

mod bridge;
mod conversion;
pub mod error;
mod logging;
mod runtime;

pub use bridge::PythonBridge;
pub use error::{PyBridgeError, PyBridgeResult};
pub use runtime::{RuntimeLease, RuntimeSession};
