use std::fmt;
use std::sync::Arc;

use datafusion_common::arrow::datatypes::SchemaRef;
use log::{debug, info, warn};
use pyfdw_common::config::{IterationFaultPolicy, RescanPolicy, ScanConfig};

use crate::bridge::{Advance, BridgeRegistry, RowSequence, RuntimeBridge};
use crate::error::{ScanError, ScanResult};
use crate::marshal::{CastTypeInput, OutputTuple, RowMarshaller, TypeInput};
use crate::options::{CatalogOptionResolver, ForeignTable, OptionResolver, WrapperIdentity};

const EXPLAIN_LABEL: &str = "Foreign dummy";
const EXPLAIN_VALUE: &str = "dummy";
const EXPLAIN_COST: f64 = 10.5;
const STARTUP_COST: f64 = 10.0;
const TOTAL_COST: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unstarted,
    Active,
    Exhausted,
    Ended,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Unstarted => "unstarted",
            ScanState::Active => "active",
            ScanState::Exhausted => "exhausted",
            ScanState::Ended => "ended",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub iteration_fault: IterationFaultPolicy,
    pub rescan: RescanPolicy,
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            iteration_fault: config.iteration_fault,
            rescan: config.rescan,
        }
    }
}

/// What the host shows for the scan node in query plans.
///
/// The plan costs are fixed and always present. `cost` is only shown when the
/// host asks for costs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainOutput {
    pub label: &'static str,
    pub value: &'static str,
    pub cost: Option<f64>,
    pub startup_cost: f64,
    pub total_cost: f64,
}

struct ScanSession {
    identity: WrapperIdentity,
    bridge: Arc<dyn RuntimeBridge>,
    columns: Vec<String>,
    sequence: Option<Box<dyn RowSequence>>,
    marshaller: RowMarshaller,
    row_count: usize,
}

impl ScanSession {
    fn stop_sequence(&mut self) {
        if let Some(mut sequence) = self.sequence.take() {
            sequence.stop();
        }
    }
}

/// Drives one foreign table scan.
///
/// The host calls [`begin`](Self::begin) once, then [`next`](Self::next) until it returns
/// `None`, optionally [`rescan`](Self::rescan), and finally [`end`](Self::end).
/// Dropping the controller ends the scan.
pub struct ScanController {
    options: ScanOptions,
    resolver: Arc<dyn OptionResolver>,
    registry: Arc<BridgeRegistry>,
    type_input: Arc<dyn TypeInput>,
    state: ScanState,
    session: Option<ScanSession>,
}

impl fmt::Debug for ScanController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanController")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("row_count", &self.row_count())
            .finish()
    }
}

impl ScanController {
    pub fn new(
        options: ScanOptions,
        resolver: Arc<dyn OptionResolver>,
        registry: Arc<BridgeRegistry>,
    ) -> Self {
        Self {
            options,
            resolver,
            registry,
            type_input: Arc::new(CastTypeInput),
            state: ScanState::Unstarted,
            session: None,
        }
    }

    /// Creates a controller that resolves wrappers from catalog options.
    pub fn from_config(config: &ScanConfig, registry: Arc<BridgeRegistry>) -> Self {
        Self::new(
            config.into(),
            Arc::new(CatalogOptionResolver::new(config)),
            registry,
        )
    }

    pub fn with_type_input(mut self, type_input: Arc<dyn TypeInput>) -> Self {
        self.type_input = type_input;
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// The number of rows returned since the scan began or was last rescanned.
    pub fn row_count(&self) -> usize {
        self.session.as_ref().map(|s| s.row_count).unwrap_or(0)
    }

    /// Resolves the wrapper of the table and starts it.
    ///
    /// A failed `begin` ends the scan.
    pub fn begin(&mut self, schema: SchemaRef, table: &ForeignTable) -> ScanResult<()> {
        if self.state != ScanState::Unstarted {
            return Err(ScanError::invalid_state(format!(
                "cannot begin a scan that is {}",
                self.state
            )));
        }
        match self.start_session(schema, table) {
            Ok(session) => {
                info!(
                    "began scan of foreign table {} with wrapper {}",
                    table.name, session.identity
                );
                self.session = Some(session);
                self.state = ScanState::Active;
                Ok(())
            }
            Err(e) => {
                self.state = ScanState::Ended;
                Err(e)
            }
        }
    }

    fn start_session(&self, schema: SchemaRef, table: &ForeignTable) -> ScanResult<ScanSession> {
        debug!("resolving options for foreign table {}", table.name);
        let identity = self.resolver.resolve(table)?;
        let bridge = self.registry.get(identity.runtime()).ok_or_else(|| {
            ScanError::configuration(format!(
                "no runtime bridge named \"{}\" (available: {})",
                identity.runtime(),
                self.registry.list().join(", ")
            ))
        })?;
        let columns = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect::<Vec<_>>();
        debug!("starting wrapper {identity}");
        let sequence = bridge.start(&identity, &columns)?;
        Ok(ScanSession {
            identity,
            bridge,
            columns,
            sequence: Some(sequence),
            marshaller: RowMarshaller::new(schema, Arc::clone(&self.type_input)),
            row_count: 0,
        })
    }

    /// Returns the next tuple, or `None` once the wrapper has no more rows.
    pub fn next(&mut self) -> ScanResult<Option<OutputTuple>> {
        match self.state {
            ScanState::Active => {}
            ScanState::Exhausted => return Ok(None),
            ScanState::Unstarted | ScanState::Ended => {
                return Err(ScanError::invalid_state(format!(
                    "cannot fetch rows from a scan that is {}",
                    self.state
                )))
            }
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ScanError::internal("active scan without a session"))?;
        let advance = match session.sequence.as_mut() {
            Some(sequence) => sequence.advance()?,
            None => Advance::EndOfSequence,
        };
        match advance {
            Advance::Row(record) => {
                let tuple = session.marshaller.to_tuple(&record)?;
                session.row_count += 1;
                Ok(Some(tuple))
            }
            Advance::EndOfSequence => {
                debug!(
                    "wrapper {} exhausted after {} rows",
                    session.identity, session.row_count
                );
                self.state = ScanState::Exhausted;
                Ok(None)
            }
            Advance::RuntimeFault(message) => {
                self.state = ScanState::Exhausted;
                match self.options.iteration_fault {
                    IterationFaultPolicy::EndOfData => {
                        warn!(
                            "wrapper {} failed while producing rows, ending the scan: {message}",
                            session.identity
                        );
                        Ok(None)
                    }
                    IterationFaultPolicy::Fail => Err(ScanError::IterationFault(message)),
                }
            }
        }
    }

    /// Restarts the scan from the host's point of view.
    ///
    /// The row counter is always reset. Whether the wrapper is restarted depends on the
    /// rescan policy: with [`RescanPolicy::CounterOnly`] the current sequence keeps being
    /// pulled from where it stopped.
    pub fn rescan(&mut self) -> ScanResult<()> {
        if !matches!(self.state, ScanState::Active | ScanState::Exhausted) {
            return Err(ScanError::invalid_state(format!(
                "cannot rescan a scan that is {}",
                self.state
            )));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ScanError::internal("active scan without a session"))?;
        session.row_count = 0;
        if self.options.rescan == RescanPolicy::Rebuild {
            debug!("restarting wrapper {}", session.identity);
            session.stop_sequence();
            match session.bridge.start(&session.identity, &session.columns) {
                Ok(sequence) => session.sequence = Some(sequence),
                Err(e) => {
                    self.state = ScanState::Exhausted;
                    return Err(e);
                }
            }
        }
        self.state = ScanState::Active;
        Ok(())
    }

    /// Releases the wrapper and its runtime session. Ending an ended scan does nothing.
    pub fn end(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop_sequence();
            info!(
                "ended scan with wrapper {} after {} rows",
                session.identity, session.row_count
            );
        }
        self.state = ScanState::Ended;
    }

    pub fn explain(&self, costs: bool) -> ExplainOutput {
        ExplainOutput {
            label: EXPLAIN_LABEL,
            value: EXPLAIN_VALUE,
            cost: costs.then_some(EXPLAIN_COST),
            startup_cost: STARTUP_COST,
            total_cost: TOTAL_COST,
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.end();
    }
}
