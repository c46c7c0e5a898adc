//! Shared runtime state of mapped targets and their triggers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use bytes::Bytes;
use ddlkit_codec::{Codec, CodecFactory, CodecIndex, Decoder, Representation, Value};
use ddlkit_layout::ScalarType;
use tracing::{trace, warn};

use crate::config::Comparator;
use crate::environment::{MappingEnvironment, PeriodicListener, TargetHandle};
use crate::error::Result;
use crate::transformation::Transformation;

/// State visible to timer threads as well as the engine.
pub(crate) struct Shared {
    pub env: Arc<dyn MappingEnvironment>,
    pub running: AtomicBool,
    pub representation: Representation,
}

impl Shared {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// A generated target element.
pub(crate) enum Generated {
    SimulationTime(CodecIndex),
    TriggerCounter { index: CodecIndex, modulo: Option<u64> },
}

pub(crate) struct Target {
    pub handle: TargetHandle,
    pub name: String,
    pub type_name: String,
    pub factory: Arc<CodecFactory>,
    buffer: RwLock<Vec<u8>>,
    counter: AtomicU64,
    generated: Vec<Generated>,
    /// Arrival flags: source name and element.
    received: Vec<(String, CodecIndex)>,
    constants: Vec<(CodecIndex, Value)>,
}

impl Target {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: TargetHandle,
        name: String,
        type_name: String,
        factory: Arc<CodecFactory>,
        size: usize,
        generated: Vec<Generated>,
        received: Vec<(String, CodecIndex)>,
        constants: Vec<(CodecIndex, Value)>,
    ) -> Self {
        Self {
            handle,
            name,
            type_name,
            factory,
            buffer: RwLock::new(vec![0; size]),
            counter: AtomicU64::new(0),
            generated,
            received,
            constants,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.buffer.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.buffer.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.read())
    }

    /// Defaults, then schema constants, then configured constants.
    pub fn reset(&self, representation: Representation) -> Result<()> {
        let mut buffer = self.write();
        buffer.fill(0);
        let mut codec = Codec::new(&self.factory, &mut buffer, representation)?;
        codec.reset_to_defaults()?;
        for (index, value) in &self.constants {
            codec.set_value(index, *value)?;
        }
        self.counter.store(0, Ordering::Release);
        Ok(())
    }

    pub fn mark_received(&self, codec: &mut Codec<'_>, source: &str) -> Result<()> {
        for (_, index) in self.received.iter().filter(|(name, _)| name == source) {
            codec.set_value(index, Value::Bool(true))?;
        }
        Ok(())
    }

    /// Fill generated elements, send the buffer and clear arrival flags.
    pub fn transmit(&self, shared: &Shared) -> Result<()> {
        let count = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        let data = {
            let mut buffer = self.write();
            let mut codec = Codec::new(&self.factory, &mut buffer, shared.representation)?;
            for generated in &self.generated {
                match generated {
                    Generated::SimulationTime(index) => {
                        let micros = u64::try_from(shared.env.time().as_micros()).unwrap_or(u64::MAX);
                        codec.set_value(index, coerce(Value::UInt(micros), index.scalar))?;
                    }
                    Generated::TriggerCounter { index, modulo } => {
                        let value = modulo.map_or(count, |m| count % m);
                        codec.set_value(index, coerce(Value::UInt(value), index.scalar))?;
                    }
                }
            }
            drop(codec);
            let data = Bytes::copy_from_slice(&buffer);
            if !self.received.is_empty() {
                let mut codec = Codec::new(&self.factory, &mut buffer, shared.representation)?;
                for (_, index) in &self.received {
                    codec.set_value(index, Value::Bool(false))?;
                }
            }
            data
        };
        let status = shared.env.send_target(self.handle, &data);
        if !status.is_ok() {
            warn!(target_name = %self.name, %status, "host rejected target data");
        }
        trace!(target_name = %self.name, count, bytes = data.len(), "target transmitted");
        Ok(())
    }
}

/// One assignment from a source element into a target element.
pub(crate) struct Assignment {
    pub from: CodecIndex,
    pub to: CodecIndex,
    pub transformation: Option<Arc<dyn Transformation>>,
}

/// Everything one source writes into one target.
pub(crate) struct AssignmentGroup {
    pub target: Arc<Target>,
    pub assignments: Vec<Assignment>,
}

impl AssignmentGroup {
    pub fn apply(&self, source: &str, decoder: &Decoder<'_>, representation: Representation) -> Result<()> {
        let mut buffer = self.target.write();
        let mut codec = Codec::new(&self.target.factory, &mut buffer, representation)?;
        self.target.mark_received(&mut codec, source)?;
        for assignment in &self.assignments {
            let value = decoder.get_value(&assignment.from)?;
            let value = match &assignment.transformation {
                Some(transformation) => Value::Float(transformation.evaluate(value.as_f64())),
                None => value,
            };
            codec.set_value(&assignment.to, coerce(value, assignment.to.scalar))?;
        }
        Ok(())
    }
}

/// Converts between booleans and numbers the way assignments expect.
pub(crate) fn coerce(value: Value, scalar: ScalarType) -> Value {
    match (value, scalar) {
        (Value::Bool(_), ScalarType::Bool) => value,
        (Value::Bool(flag), _) => Value::UInt(u64::from(flag)),
        (_, ScalarType::Bool) => Value::Bool(value.as_f64() != 0.0),
        _ => value,
    }
}

/// Identity of a shareable trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TriggerKey {
    Periodic(Duration),
    Signal(String),
    Data {
        source: String,
        element: String,
        comparator: Comparator,
        /// Bit pattern of the threshold.
        threshold: u64,
    },
}

impl TriggerKey {
    pub fn source(&self) -> Option<&str> {
        match self {
            TriggerKey::Periodic(_) => None,
            TriggerKey::Signal(source) | TriggerKey::Data { source, .. } => Some(source),
        }
    }
}

pub(crate) struct DataCondition {
    pub index: CodecIndex,
    pub comparator: Comparator,
    pub threshold: f64,
}

pub(crate) struct Trigger {
    pub key: TriggerKey,
    pub condition: Option<DataCondition>,
    targets: RwLock<Vec<Arc<Target>>>,
    shared: Weak<Shared>,
}

impl Trigger {
    pub fn new(key: TriggerKey, condition: Option<DataCondition>, shared: &Arc<Shared>) -> Self {
        Self {
            key,
            condition,
            targets: RwLock::new(Vec::new()),
            shared: Arc::downgrade(shared),
        }
    }

    pub fn attach(&self, target: Arc<Target>) {
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
    }

    /// Remaining number of users.
    pub fn detach(&self, handle: TargetHandle) -> usize {
        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        targets.retain(|target| target.handle != handle);
        targets.len()
    }

    pub fn user_count(&self) -> usize {
        self.targets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn holds(&self, decoder: &Decoder<'_>) -> Result<bool> {
        match &self.condition {
            None => Ok(true),
            Some(condition) => {
                let value = decoder.get_value(&condition.index)?.as_f64();
                Ok(condition.comparator.holds(value, condition.threshold))
            }
        }
    }

    /// Transmit every attached target while the engine runs.
    pub fn fire(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if !shared.is_running() {
            return;
        }
        let targets = self.targets.read().unwrap_or_else(PoisonError::into_inner).clone();
        trace!(trigger = ?self.key, targets = targets.len(), "trigger fired");
        for target in targets {
            if let Err(err) = target.transmit(&shared) {
                warn!(target_name = %target.name, error = %err, "target transmission failed");
            }
        }
    }
}

impl PeriodicListener for Trigger {
    fn on_timer(&self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_between_bool_and_numbers() {
        assert_eq!(coerce(Value::Int(0), ScalarType::Bool), Value::Bool(false));
        assert_eq!(coerce(Value::Float(0.5), ScalarType::Bool), Value::Bool(true));
        assert_eq!(coerce(Value::Bool(true), ScalarType::Float32), Value::UInt(1));
        assert_eq!(coerce(Value::Int(-4), ScalarType::Int16), Value::Int(-4));
    }

    #[test]
    fn trigger_keys_compare_by_threshold_bits() {
        let key = |threshold: f64| TriggerKey::Data {
            source: "pos".to_string(),
            element: "x".to_string(),
            comparator: Comparator::Greater,
            threshold: threshold.to_bits(),
        };
        assert_eq!(key(1.5), key(1.5));
        assert_ne!(key(1.5), key(2.5));
        assert_eq!(key(1.5).source(), Some("pos"));
        assert_eq!(TriggerKey::Periodic(Duration::from_millis(5)).source(), None);
    }
}
