use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ScanResult;
use crate::options::WrapperIdentity;
use crate::record::Record;

/// The outcome of pulling one element from a row sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Row(Record),
    EndOfSequence,
    /// The runtime raised while producing the element.
    /// The message carries the runtime's diagnostic text.
    RuntimeFault(String),
}

/// A lazy, forward-only sequence of records produced by a started wrapper.
///
/// Once [`Advance::EndOfSequence`] or [`Advance::RuntimeFault`] has been returned,
/// every later `advance` returns [`Advance::EndOfSequence`].
pub trait RowSequence: Send {
    /// Pulls exactly one element.
    ///
    /// An error is returned when the element is produced but cannot be read as a record.
    fn advance(&mut self) -> ScanResult<Advance>;

    /// Releases the sequence and every runtime resource it holds.
    /// Calling it more than once has no further effect.
    fn stop(&mut self);
}

/// A named adapter that can start wrapper objects inside some runtime.
pub trait RuntimeBridge: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Resolves the wrapper class, instantiates it with the identity's configuration
    /// and returns the sequence produced by its row-producing method.
    ///
    /// Each produced row is read only for the given column names. Other keys of the row
    /// are never looked at, and a column the row does not have is left out of the record.
    fn start(
        &self,
        identity: &WrapperIdentity,
        columns: &[String],
    ) -> ScanResult<Box<dyn RowSequence>>;
}

/// Thread-safe registry of runtime bridges keyed by name.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    bridges: DashMap<String, Arc<dyn RuntimeBridge>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bridge under its own name, replacing any bridge with the same name.
    pub fn register(&self, bridge: Arc<dyn RuntimeBridge>) {
        log::debug!("registering runtime bridge: {}", bridge.name());
        self.bridges.insert(bridge.name().to_string(), bridge);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RuntimeBridge>> {
        self.bridges.get(name).map(|b| Arc::clone(b.value()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names = self
            .bridges
            .iter()
            .map(|b| b.key().clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bridges.contains_key(name)
    }
}
