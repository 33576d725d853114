use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::bridge::{Advance, RowSequence, RuntimeBridge};
use crate::error::{ScanError, ScanResult};
use crate::options::WrapperIdentity;
use crate::record::Record;

/// A bridge that replays scripted outcomes for each known wrapper path.
#[derive(Debug)]
pub(crate) struct MemoryBridge {
    name: String,
    wrappers: HashMap<String, Vec<Advance>>,
    max_starts: Option<usize>,
    starts: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    last_config: Mutex<Option<BTreeMap<String, String>>>,
}

impl MemoryBridge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wrappers: HashMap::new(),
            max_starts: None,
            starts: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            last_config: Mutex::new(None),
        }
    }

    pub fn with_rows(self, wrapper: &str, rows: Vec<Record>) -> Self {
        self.with_script(wrapper, rows.into_iter().map(Advance::Row).collect())
    }

    pub fn with_script(mut self, wrapper: &str, script: Vec<Advance>) -> Self {
        self.wrappers.insert(wrapper.to_string(), script);
        self
    }

    /// Fails every `start` after the given number of successful ones.
    pub fn with_max_starts(mut self, max_starts: usize) -> Self {
        self.max_starts = Some(max_starts);
        self
    }

    /// The number of successful `start` calls.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// The number of started sequences that have not been stopped.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<BTreeMap<String, String>> {
        self.last_config.lock().ok().and_then(|c| c.clone())
    }
}

impl RuntimeBridge for MemoryBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(
        &self,
        identity: &WrapperIdentity,
        columns: &[String],
    ) -> ScanResult<Box<dyn RowSequence>> {
        let script = self.wrappers.get(&identity.path()).ok_or_else(|| {
            ScanError::resolution(format!("no wrapper named {}", identity.path()))
        })?;
        if self
            .max_starts
            .is_some_and(|max| self.starts.load(Ordering::SeqCst) >= max)
        {
            return Err(ScanError::resolution(format!(
                "wrapper {} cannot be started again",
                identity.path()
            )));
        }
        if let Ok(mut config) = self.last_config.lock() {
            *config = Some(identity.config().clone());
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySequence {
            items: script
                .iter()
                .map(|advance| project(advance, columns))
                .collect(),
            finished: false,
            stopped: false,
            active: Arc::clone(&self.active),
        }))
    }
}

fn project(advance: &Advance, columns: &[String]) -> Advance {
    match advance {
        Advance::Row(record) => Advance::Row(
            columns
                .iter()
                .filter_map(|c| record.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        ),
        other => other.clone(),
    }
}

struct MemorySequence {
    items: VecDeque<Advance>,
    finished: bool,
    stopped: bool,
    active: Arc<AtomicUsize>,
}

impl RowSequence for MemorySequence {
    fn advance(&mut self) -> ScanResult<Advance> {
        if self.finished {
            return Ok(Advance::EndOfSequence);
        }
        match self.items.pop_front() {
            Some(Advance::Row(record)) => Ok(Advance::Row(record)),
            Some(Advance::RuntimeFault(message)) => {
                self.finished = true;
                Ok(Advance::RuntimeFault(message))
            }
            Some(Advance::EndOfSequence) | None => {
                self.finished = true;
                Ok(Advance::EndOfSequence)
            }
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.finished = true;
            self.items.clear();
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn test_sequence_is_single_pass() -> ScanResult<()> {
        let bridge = MemoryBridge::new("memory").with_rows(
            "samplepkg.CsvWrapper",
            vec![[("id", Value::Integer(1))].into_iter().collect()],
        );
        let identity = WrapperIdentity::try_new("memory", "samplepkg.CsvWrapper", BTreeMap::new())?;
        let mut sequence = bridge.start(&identity, &["id".to_string()])?;
        assert!(matches!(sequence.advance()?, Advance::Row(_)));
        for _ in 0..3 {
            assert_eq!(sequence.advance()?, Advance::EndOfSequence);
        }
        sequence.stop();
        sequence.stop();
        assert_eq!(bridge.active(), 0);
        Ok(())
    }
}
