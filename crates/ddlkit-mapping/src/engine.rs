use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ddlkit_codec::{CodecFactory, CodecIndex, Status, Value};
use ddlkit_model::{DataDefinition, DdlReader, ReaderConfig};
use tracing::{debug, trace, warn};

use crate::config::{
    AssignmentSource, EngineConfig, MapConfiguration, MapFunction, MapTarget, MapTransformation,
    MapTrigger,
};
use crate::environment::{MappingEnvironment, PeriodicListener, TargetHandle};
use crate::error::{MappingError, Result};
use crate::runtime::{
    Assignment, AssignmentGroup, DataCondition, Generated, Shared, Target, Trigger, TriggerKey,
};
use crate::transformation::{EnumTable, Polynomial, Transformation};

struct Source {
    type_name: String,
    factory: Arc<CodecFactory>,
    users: Vec<TargetHandle>,
    groups: Vec<AssignmentGroup>,
    /// Signal and data triggers evaluated on every sample.
    triggers: Vec<Arc<Trigger>>,
}

struct MappedTarget {
    target: Arc<Target>,
    sources: Vec<String>,
    triggers: Vec<TriggerKey>,
}

/// A source that `map` has to create.
struct NewSource {
    name: String,
    type_name: String,
    factory: Arc<CodecFactory>,
}

/// Maps configured targets from source samples.
///
/// Structural calls (`map`, `unmap`, `reset`) take `&mut self` and are only
/// accepted while the engine is stopped. Sample delivery, trigger callbacks
/// and `get_current_data` take `&self` and may run on different threads.
pub struct MappingEngine {
    config: EngineConfig,
    mapping: MapConfiguration,
    shared: Arc<Shared>,
    sources: HashMap<String, Source>,
    targets: BTreeMap<TargetHandle, MappedTarget>,
    triggers: HashMap<TriggerKey, Arc<Trigger>>,
    transformations: HashMap<String, Arc<dyn Transformation>>,
    next_handle: u64,
}

impl MappingEngine {
    pub fn new(
        config: EngineConfig,
        mapping: MapConfiguration,
        env: Arc<dyn MappingEnvironment>,
    ) -> Self {
        let shared = Arc::new(Shared {
            env,
            running: AtomicBool::new(false),
            representation: config.representation,
        });
        Self {
            config,
            mapping,
            shared,
            sources: HashMap::new(),
            targets: BTreeMap::new(),
            triggers: HashMap::new(),
            transformations: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn configuration(&self) -> &MapConfiguration {
        &self.mapping
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Users of the `index`-th distinct trigger of a mapped target.
    pub fn trigger_users(&self, handle: TargetHandle, index: usize) -> Option<usize> {
        let key = self.targets.get(&handle)?.triggers.get(index)?;
        Some(self.triggers.get(key)?.user_count())
    }

    pub fn handle_of(&self, target: &str) -> Option<TargetHandle> {
        self.targets
            .iter()
            .find(|(_, mapped)| mapped.target.name == target)
            .map(|(handle, _)| *handle)
    }

    /// Named transformations take precedence over configured ones of the
    /// same name for targets mapped afterwards.
    pub fn register_transformation(
        &mut self,
        name: impl Into<String>,
        transformation: Arc<dyn Transformation>,
    ) {
        self.transformations.insert(name.into(), transformation);
    }

    pub fn start(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(MappingError::InvalidState("engine is already running".to_string()));
        }
        debug!(targets = self.targets.len(), "mapping engine started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return Err(MappingError::InvalidState("engine is not running".to_string()));
        }
        debug!("mapping engine stopped");
        Ok(())
    }

    /// Restore every target buffer to its defaults and configured constants.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_stopped("reset")?;
        for mapped in self.targets.values() {
            mapped.target.reset(self.shared.representation)?;
        }
        debug!(targets = self.targets.len(), "mapping targets reset");
        Ok(())
    }

    /// Map a configured target. Either everything the target needs is
    /// registered or nothing is.
    pub fn map(&mut self, target_name: &str) -> Result<TargetHandle> {
        self.ensure_stopped("map")?;
        let config = self
            .mapping
            .target(target_name)
            .cloned()
            .ok_or_else(|| MappingError::UnknownTarget(target_name.to_string()))?;
        if self.handle_of(target_name).is_some() {
            return Err(MappingError::AlreadyMapped(target_name.to_string()));
        }
        let representation = self.shared.representation;
        let (factory, definition) = self.load_type(&config.type_name)?;
        let size = factory.static_buffer_size(representation).ok_or_else(|| {
            MappingError::Unsupported(format!(
                "target type '{}' has dynamic arrays",
                config.type_name
            ))
        })?;

        let source_names: Vec<String> = config
            .referenced_sources()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut source_factories = HashMap::new();
        let mut new_sources = Vec::new();
        for name in &source_names {
            if let Some(existing) = self.sources.get(name) {
                source_factories.insert(name.clone(), Arc::clone(&existing.factory));
                continue;
            }
            let source = self
                .mapping
                .source(name)
                .ok_or_else(|| MappingError::UnknownSource(name.clone()))?;
            let (source_factory, _) = self.load_type(&source.type_name)?;
            source_factories.insert(name.clone(), Arc::clone(&source_factory));
            new_sources.push(NewSource {
                name: name.clone(),
                type_name: source.type_name.clone(),
                factory: source_factory,
            });
        }
        let source_factory = |name: &str| {
            source_factories
                .get(name)
                .ok_or_else(|| MappingError::UnknownSource(name.to_string()))
        };

        let mut groups: Vec<(String, Vec<Assignment>)> = Vec::new();
        let mut generated = Vec::new();
        let mut received = Vec::new();
        let mut constants = Vec::new();
        for assignment in &config.assignments {
            let to = factory.resolve(&assignment.to)?;
            match &assignment.from {
                AssignmentSource::Signal {
                    source,
                    element,
                    transformation,
                } => {
                    let from = source_factory(source.as_str())?.resolve(element)?;
                    let transformation = match transformation {
                        Some(name) => Some(self.transformation(name, &definition)?),
                        None => None,
                    };
                    group_for(&mut groups, source).push(Assignment {
                        from,
                        to,
                        transformation,
                    });
                }
                AssignmentSource::Constant(text) => {
                    let value = constant_value(&factory, &to, text)?;
                    constants.push((to, value));
                }
                AssignmentSource::Function(MapFunction::SimulationTime) => {
                    generated.push(Generated::SimulationTime(to))
                }
                AssignmentSource::Function(MapFunction::TriggerCounter { modulo }) => {
                    generated.push(Generated::TriggerCounter {
                        index: to,
                        modulo: *modulo,
                    })
                }
                AssignmentSource::Function(MapFunction::Received { source }) => {
                    source_factory(source.as_str())?;
                    group_for(&mut groups, source);
                    received.push((source.clone(), to));
                }
            }
        }

        let handle = TargetHandle(self.next_handle + 1);
        let target = Arc::new(Target::new(
            handle,
            config.name.clone(),
            config.type_name.clone(),
            Arc::clone(&factory),
            size,
            generated,
            received,
            constants,
        ));
        target.reset(representation)?;

        let mut trigger_plan: Vec<(TriggerKey, Arc<Trigger>, bool)> = Vec::new();
        for trigger in &config.triggers {
            let (key, condition) = match trigger {
                MapTrigger::Periodic(period) if period.is_zero() => {
                    return Err(MappingError::Configuration(format!(
                        "target '{}' has a periodic trigger with zero period",
                        config.name
                    )))
                }
                MapTrigger::Periodic(period) => (TriggerKey::Periodic(*period), None),
                MapTrigger::Signal { source } => {
                    source_factory(source.as_str())?;
                    (TriggerKey::Signal(source.clone()), None)
                }
                MapTrigger::Data {
                    source,
                    element,
                    comparator,
                    value,
                } => {
                    let index = source_factory(source.as_str())?.resolve(element)?;
                    let key = TriggerKey::Data {
                        source: source.clone(),
                        element: element.clone(),
                        comparator: *comparator,
                        threshold: value.to_bits(),
                    };
                    let condition = DataCondition {
                        index,
                        comparator: *comparator,
                        threshold: *value,
                    };
                    (key, Some(condition))
                }
            };
            if trigger_plan.iter().any(|(planned, _, _)| *planned == key) {
                continue;
            }
            match self.triggers.get(&key) {
                Some(existing) => trigger_plan.push((key, Arc::clone(existing), false)),
                None => {
                    let trigger = Arc::new(Trigger::new(key.clone(), condition, &self.shared));
                    trigger_plan.push((key, trigger, true));
                }
            }
        }

        self.register_with_host(&config, handle, &new_sources, &trigger_plan)?;

        // Nothing below fails.
        for source in new_sources {
            self.sources.insert(
                source.name,
                Source {
                    type_name: source.type_name,
                    factory: source.factory,
                    users: Vec::new(),
                    groups: Vec::new(),
                    triggers: Vec::new(),
                },
            );
        }
        for name in &source_names {
            if let Some(source) = self.sources.get_mut(name) {
                source.users.push(handle);
            }
        }
        for (name, assignments) in groups {
            if let Some(source) = self.sources.get_mut(&name) {
                source.groups.push(AssignmentGroup {
                    target: Arc::clone(&target),
                    assignments,
                });
            }
        }
        let mut trigger_keys = Vec::with_capacity(trigger_plan.len());
        for (key, trigger, created) in trigger_plan {
            trigger.attach(Arc::clone(&target));
            if created {
                if let Some(source) = key.source().and_then(|name| self.sources.get_mut(name)) {
                    source.triggers.push(Arc::clone(&trigger));
                }
                self.triggers.insert(key.clone(), trigger);
            }
            trigger_keys.push(key);
        }
        self.targets.insert(
            handle,
            MappedTarget {
                target,
                sources: source_names,
                triggers: trigger_keys,
            },
        );
        self.next_handle += 1;
        debug!(
            target_name = %config.name,
            %handle,
            sources = self.sources.len(),
            triggers = self.triggers.len(),
            "target mapped"
        );
        Ok(handle)
    }

    /// Undo `map`. Sources and triggers without remaining users are released.
    pub fn unmap(&mut self, handle: TargetHandle) -> Result<()> {
        self.ensure_stopped("unmap")?;
        let mapped = self
            .targets
            .remove(&handle)
            .ok_or(MappingError::InvalidHandle(handle.0))?;
        let env = Arc::clone(&self.shared.env);

        for key in &mapped.triggers {
            let Some(trigger) = self.triggers.get(key).cloned() else {
                continue;
            };
            if trigger.detach(handle) > 0 {
                continue;
            }
            self.triggers.remove(key);
            match key {
                TriggerKey::Periodic(period) => {
                    let listener: Arc<dyn PeriodicListener> = trigger;
                    log_host_failure("periodic timer", env.unregister_periodic_timer(*period, &listener));
                }
                _ => {
                    if let Some(source) = key.source().and_then(|name| self.sources.get_mut(name)) {
                        source.triggers.retain(|t| !Arc::ptr_eq(t, &trigger));
                    }
                }
            }
        }

        for name in &mapped.sources {
            let Some(source) = self.sources.get_mut(name) else {
                continue;
            };
            source.groups.retain(|group| group.target.handle != handle);
            source.users.retain(|user| *user != handle);
            if source.users.is_empty() {
                self.sources.remove(name);
                log_host_failure("source", env.unregister_source(name));
            }
        }

        log_host_failure("target", env.target_unmapped(&mapped.target.name, handle));
        debug!(
            target_name = %mapped.target.name,
            type_name = %mapped.target.type_name,
            %handle,
            sources = self.sources.len(),
            triggers = self.triggers.len(),
            "target unmapped"
        );
        Ok(())
    }

    /// Apply a sample of `source` to every target it feeds, then evaluate
    /// the source's triggers.
    pub fn on_sample_received(&self, source_name: &str, data: &[u8]) -> Result<()> {
        let source = self
            .sources
            .get(source_name)
            .ok_or_else(|| MappingError::UnknownSource(source_name.to_string()))?;
        let representation = self.shared.representation;
        let decoder = source.factory.make_decoder(data, representation)?;
        for group in &source.groups {
            group.apply(source_name, &decoder, representation)?;
        }
        trace!(
            source = source_name,
            type_name = %source.type_name,
            targets = source.groups.len(),
            "sample applied"
        );
        if !self.shared.is_running() {
            return Ok(());
        }
        for trigger in &source.triggers {
            if trigger.holds(&decoder)? {
                trigger.fire();
            }
        }
        Ok(())
    }

    /// Consistent copy of a target's current buffer.
    pub fn get_current_data(&self, handle: TargetHandle) -> Result<Bytes> {
        self.targets
            .get(&handle)
            .map(|mapped| mapped.target.snapshot())
            .ok_or(MappingError::InvalidHandle(handle.0))
    }

    fn ensure_stopped(&self, operation: &str) -> Result<()> {
        if self.shared.is_running() {
            return Err(MappingError::InvalidState(format!(
                "{operation} is not allowed while the engine is running"
            )));
        }
        Ok(())
    }

    fn load_type(&self, type_name: &str) -> Result<(Arc<CodecFactory>, DataDefinition)> {
        let text = self
            .shared
            .env
            .resolve_type(type_name)
            .ok_or_else(|| MappingError::TypeNotFound(type_name.to_string()))?;
        let reader = DdlReader::with_config(ReaderConfig {
            max_document_size: self.config.max_type_document_size,
            merge_predefined: true,
            ..ReaderConfig::default()
        });
        let loaded = reader.read_str(&text).map_err(|err| {
            debug!(type_name, error = %err, "type description rejected");
            MappingError::TypeNotFound(type_name.to_string())
        })?;
        let factory = CodecFactory::try_new(&loaded.definition, type_name).map_err(|err| {
            debug!(type_name, error = %err, "type is not usable");
            MappingError::TypeNotFound(type_name.to_string())
        })?;
        Ok((Arc::new(factory), loaded.definition))
    }

    fn transformation(
        &self,
        name: &str,
        definition: &DataDefinition,
    ) -> Result<Arc<dyn Transformation>> {
        if let Some(registered) = self.transformations.get(name) {
            return Ok(Arc::clone(registered));
        }
        match self.mapping.transformation(name) {
            Some(MapTransformation::Polynomial { coefficients, .. }) => {
                Ok(Arc::new(Polynomial::new(*coefficients)))
            }
            Some(table @ MapTransformation::EnumTable { .. }) => {
                Ok(Arc::new(EnumTable::from_config(table, definition)?))
            }
            None => Err(MappingError::UnknownTransformation(name.to_string())),
        }
    }

    /// Host registrations for a new target, released again on failure.
    fn register_with_host(
        &self,
        config: &MapTarget,
        handle: TargetHandle,
        new_sources: &[NewSource],
        trigger_plan: &[(TriggerKey, Arc<Trigger>, bool)],
    ) -> Result<()> {
        let env = &self.shared.env;
        let mut sources: Vec<&str> = Vec::new();
        let mut timers: Vec<(Duration, Arc<dyn PeriodicListener>)> = Vec::new();
        let unwind = |sources: &[&str], timers: &[(Duration, Arc<dyn PeriodicListener>)]| {
            for (period, listener) in timers.iter().rev() {
                log_host_failure("periodic timer", env.unregister_periodic_timer(*period, listener));
            }
            for name in sources.iter().rev() {
                log_host_failure("source", env.unregister_source(name));
            }
        };

        for source in new_sources {
            let status = env.register_source(&source.name, &source.type_name);
            if !status.is_ok() {
                unwind(&sources, &timers);
                return Err(MappingError::Host {
                    what: format!("source '{}'", source.name),
                    status,
                });
            }
            sources.push(&source.name);
        }
        for (key, trigger, created) in trigger_plan {
            let (TriggerKey::Periodic(period), true) = (key, *created) else {
                continue;
            };
            let listener: Arc<dyn PeriodicListener> = Arc::clone(trigger) as Arc<dyn PeriodicListener>;
            let status = env.register_periodic_timer(*period, Arc::clone(&listener));
            if !status.is_ok() {
                unwind(&sources, &timers);
                return Err(MappingError::Host {
                    what: format!("periodic timer of {period:?}"),
                    status,
                });
            }
            timers.push((*period, listener));
        }
        let status = env.target_mapped(&config.name, &config.type_name, handle);
        if !status.is_ok() {
            unwind(&sources, &timers);
            return Err(MappingError::Host {
                what: format!("target '{}'", config.name),
                status,
            });
        }
        Ok(())
    }
}

impl Drop for MappingEngine {
    fn drop(&mut self) {
        let env = Arc::clone(&self.shared.env);
        for (key, trigger) in self.triggers.drain() {
            if let TriggerKey::Periodic(period) = key {
                let listener: Arc<dyn PeriodicListener> = trigger;
                log_host_failure("periodic timer", env.unregister_periodic_timer(period, &listener));
            }
        }
        for (name, _) in self.sources.drain() {
            log_host_failure("source", env.unregister_source(&name));
        }
        for (handle, mapped) in std::mem::take(&mut self.targets) {
            log_host_failure("target", env.target_unmapped(&mapped.target.name, handle));
        }
    }
}

fn group_for<'g>(groups: &'g mut Vec<(String, Vec<Assignment>)>, source: &str) -> &'g mut Vec<Assignment> {
    let position = match groups.iter().position(|(name, _)| name == source) {
        Some(position) => position,
        None => {
            groups.push((source.to_string(), Vec::new()));
            groups.len() - 1
        }
    };
    &mut groups[position].1
}

/// Numeric literal or enumerator name for a constant assignment.
fn constant_value(factory: &CodecFactory, index: &CodecIndex, text: &str) -> Result<Value> {
    Value::parse(index.scalar, text)
        .or_else(|| {
            let enum_type = factory.enum_type(index.enum_name.as_deref()?)?;
            Value::parse(index.scalar, enum_type.value_of(text.trim())?)
        })
        .ok_or_else(|| {
            MappingError::Configuration(format!(
                "'{text}' is not a valid constant for '{}'",
                index.path
            ))
        })
}

fn log_host_failure(what: &str, status: Status) {
    if !status.is_ok() {
        warn!(what, %status, "host failed to release registration");
    }
}
