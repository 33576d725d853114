//! Scan lifecycle for foreign tables whose rows come from a wrapper object living in an
//! embedded runtime.
//!
//! The host drives a [`ScanController`] through `begin`, `next`, `rescan` and `end`.
//! The controller resolves the wrapper through an [`OptionResolver`], starts it through a
//! [`RuntimeBridge`] looked up by name in a [`BridgeRegistry`], and turns every produced
//! [`Record`] into a typed tuple with a [`RowMarshaller`].

pub mod bridge;
pub mod controller;
pub mod error;
pub mod marshal;
pub mod options;
pub mod record;

pub use bridge::{Advance, BridgeRegistry, RowSequence, RuntimeBridge};
pub use controller::{ExplainOutput, ScanController, ScanOptions, ScanState};
pub use error::{ScanError, ScanResult};
pub use marshal::{CastTypeInput, OutputTuple, RowMarshaller, TypeInput};
pub use options::{CatalogOptionResolver, ForeignTable, OptionResolver, WrapperIdentity};
pub use record::{Record, Value};

#[cfg(test)]
pub(crate) mod testing;
