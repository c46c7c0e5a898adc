use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::collection::{Collection, EntityInfo};
use crate::dependency::{DependencyGraph, DependencyKind, EntityRef};
use crate::entity::{
    BaseUnit, DataType, Entity, EntityKind, EnumType, Header, Namespace, Reference, Stream,
    StreamMetaType, StructType, Unit, UnitPrefix,
};
use crate::error::{ModelError, Problem, Result};
use crate::events::{
    translate, CollectionEvent, EventFilter, EventResponse, ModelEvent, SubscriptionId,
    Subscribers,
};
use crate::validation::{ValidationLevel, Validator};

/// Run `$body` with `$c` bound to the collection that stores `$kind`.
macro_rules! dispatch {
    ($def:expr, $kind:expr, |$c:ident| $body:expr) => {
        match $kind {
            EntityKind::BaseUnit => {
                let $c = &$def.base_units;
                $body
            }
            EntityKind::UnitPrefix => {
                let $c = &$def.prefixes;
                $body
            }
            EntityKind::Unit => {
                let $c = &$def.units;
                $body
            }
            EntityKind::DataType => {
                let $c = &$def.data_types;
                $body
            }
            EntityKind::EnumType => {
                let $c = &$def.enums;
                $body
            }
            EntityKind::StructType => {
                let $c = &$def.structs;
                $body
            }
            EntityKind::StreamMetaType => {
                let $c = &$def.stream_meta_types;
                $body
            }
            EntityKind::Stream => {
                let $c = &$def.streams;
                $body
            }
        }
    };
}

macro_rules! dispatch_mut {
    ($def:expr, $kind:expr, |$c:ident| $body:expr) => {
        match $kind {
            EntityKind::BaseUnit => {
                let $c = &mut $def.base_units;
                $body
            }
            EntityKind::UnitPrefix => {
                let $c = &mut $def.prefixes;
                $body
            }
            EntityKind::Unit => {
                let $c = &mut $def.units;
                $body
            }
            EntityKind::DataType => {
                let $c = &mut $def.data_types;
                $body
            }
            EntityKind::EnumType => {
                let $c = &mut $def.enums;
                $body
            }
            EntityKind::StructType => {
                let $c = &mut $def.structs;
                $body
            }
            EntityKind::StreamMetaType => {
                let $c = &mut $def.stream_meta_types;
                $body
            }
            EntityKind::Stream => {
                let $c = &mut $def.streams;
                $body
            }
        }
    };
}

/// A complete data description: header, units, types and streams.
///
/// All mutation goes through this type. Names are unique per namespace,
/// every change keeps the dependency graph current and resets the
/// validation state of whatever depends on the changed entity.
/// Call [`DataDefinition::validate`] to recompute levels.
#[derive(Debug, Default)]
pub struct DataDefinition {
    header: Header,
    pub(crate) base_units: Collection<BaseUnit>,
    pub(crate) prefixes: Collection<UnitPrefix>,
    pub(crate) units: Collection<Unit>,
    pub(crate) data_types: Collection<DataType>,
    pub(crate) enums: Collection<EnumType>,
    pub(crate) structs: Collection<StructType>,
    pub(crate) stream_meta_types: Collection<StreamMetaType>,
    pub(crate) streams: Collection<Stream>,
    graph: DependencyGraph,
    subscribers: Subscribers,
    level: ValidationLevel,
    dirty: bool,
}

impl Clone for DataDefinition {
    /// Deep copy. Subscriptions are not carried over.
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            base_units: self.base_units.clone(),
            prefixes: self.prefixes.clone(),
            units: self.units.clone(),
            data_types: self.data_types.clone(),
            enums: self.enums.clone(),
            structs: self.structs.clone(),
            stream_meta_types: self.stream_meta_types.clone(),
            streams: self.streams.clone(),
            graph: self.graph.clone(),
            subscribers: Subscribers::default(),
            level: self.level,
            dirty: self.dirty,
        }
    }
}

impl DataDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn set_header(&mut self, header: Header) {
        self.header = header;
        self.dirty = true;
    }

    /// True until the first entity or header is set.
    pub fn is_empty(&self) -> bool {
        !self.dirty
    }

    pub fn base_units(&self) -> &Collection<BaseUnit> {
        &self.base_units
    }

    pub fn prefixes(&self) -> &Collection<UnitPrefix> {
        &self.prefixes
    }

    pub fn units(&self) -> &Collection<Unit> {
        &self.units
    }

    pub fn data_types(&self) -> &Collection<DataType> {
        &self.data_types
    }

    pub fn enums(&self) -> &Collection<EnumType> {
        &self.enums
    }

    pub fn structs(&self) -> &Collection<StructType> {
        &self.structs
    }

    pub fn stream_meta_types(&self) -> &Collection<StreamMetaType> {
        &self.stream_meta_types
    }

    pub fn streams(&self) -> &Collection<Stream> {
        &self.streams
    }

    pub fn collection<T: Entity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    pub fn get<T: Entity>(&self, name: &str) -> Option<&T> {
        T::collection(self).get(name)
    }

    pub fn contains<T: Entity>(&self, name: &str) -> bool {
        T::collection(self).contains(name)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Kind of the entity that owns `name` in `namespace`.
    pub fn kind_of(&self, namespace: Namespace, name: &str) -> Option<EntityKind> {
        namespace
            .kinds()
            .iter()
            .copied()
            .find(|kind| dispatch!(self, *kind, |c| c.contains(name)))
    }

    pub fn info_of(&self, entity: &EntityRef) -> Option<&EntityInfo> {
        dispatch!(self, entity.kind, |c| c.info(&entity.name))
    }

    /// Stored level of an entity; `Unknown` when absent or not yet validated.
    pub fn level_of(&self, entity: &EntityRef) -> ValidationLevel {
        self.info_of(entity)
            .map(EntityInfo::level)
            .unwrap_or_default()
    }

    /// Every entity, in kind order then insertion order.
    pub fn entity_refs(&self) -> impl Iterator<Item = EntityRef> + '_ {
        EntityKind::ALL.into_iter().flat_map(move |kind| {
            let names: Vec<EntityRef> = dispatch!(self, kind, |c| c
                .names()
                .map(|name| EntityRef::new(kind, name))
                .collect());
            names
        })
    }

    pub fn entity_count(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|kind| dispatch!(self, *kind, |c| c.len()))
            .sum()
    }

    /// Insert a new entity. Fails if its name is taken in the namespace.
    pub fn add<T: Entity>(&mut self, item: T) -> Result<()> {
        let name = item.name().to_string();
        if let Some(kind) = self.kind_of(T::KIND.namespace(), &name) {
            return Err(ModelError::NameCollision { kind, name });
        }
        T::collection_mut(self).push(item);
        let entity = EntityRef::new(T::KIND, &name);
        self.record_edges(&entity);
        // Entities that referenced the name while it was unresolved.
        self.invalidate(&entity, false);
        self.dirty = true;
        trace!(kind = %T::KIND, name = %name, "entity added");
        self.emit(T::KIND, CollectionEvent::Inserted, &name, None);
        Ok(())
    }

    /// Insert or replace an entity of the same kind.
    pub fn emplace<T: Entity>(&mut self, item: T) -> Result<()> {
        let name = item.name().to_string();
        match self.kind_of(T::KIND.namespace(), &name) {
            None => self.add(item),
            Some(kind) if kind != T::KIND => Err(ModelError::NameCollision { kind, name }),
            Some(_) => {
                T::collection_mut(self).replace(item);
                let entity = EntityRef::new(T::KIND, &name);
                self.record_edges(&entity);
                self.invalidate(&entity, true);
                self.dirty = true;
                self.emit(T::KIND, CollectionEvent::Replaced, &name, None);
                Ok(())
            }
        }
    }

    /// Modify an entity in place.
    ///
    /// Renames are not possible through this path; a changed name is put
    /// back. Use [`DataDefinition::rename`] instead.
    pub fn update<T: Entity, F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let record = T::collection_mut(self)
            .record_mut(name)
            .ok_or_else(|| not_found(T::KIND, name))?;
        f(&mut record.value);
        if record.value.name() != name {
            record.value.set_name(name.to_string());
        }
        let entity = EntityRef::new(T::KIND, name);
        self.record_edges(&entity);
        self.invalidate(&entity, true);
        self.dirty = true;
        self.emit(T::KIND, CollectionEvent::Updated, name, None);
        Ok(())
    }

    /// Element-level mutation of a struct.
    pub fn update_struct<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut StructType),
    {
        self.update::<StructType, F>(name, f)
    }

    /// Rename an entity and every reference to it.
    ///
    /// Subscribers of the entity's kind and of every dependent's kind see a
    /// [`ChangeCode::Renaming`](crate::ChangeCode::Renaming) event first; a
    /// single rejection leaves the definition untouched.
    pub fn rename<T: Entity>(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if !T::collection(self).contains(old) {
            return Err(not_found(T::KIND, old));
        }
        let namespace = T::KIND.namespace();
        if let Some(kind) = self.kind_of(namespace, new) {
            return Err(ModelError::NameCollision {
                kind,
                name: new.to_string(),
            });
        }

        let direct = self.graph.dependents(namespace, old);
        let pending = ModelEvent {
            kind: T::KIND,
            code: translate(CollectionEvent::RenamePending),
            name: new.to_string(),
            old_name: Some(old.to_string()),
        };
        let mut rejection = self.subscribers.notify(&pending);
        let dependent_kinds: BTreeSet<EntityKind> = direct
            .iter()
            .map(|d| d.kind)
            .filter(|kind| *kind != T::KIND)
            .collect();
        for kind in dependent_kinds {
            if let Some(reason) = self.subscribers.notify_routed(kind, &pending) {
                rejection.get_or_insert(reason);
            }
        }
        if let Some(reason) = rejection {
            debug!(kind = %T::KIND, old, new, %reason, "rename rejected");
            return Err(ModelError::RenameRejected {
                kind: T::KIND,
                old: old.to_string(),
                new: new.to_string(),
                reason,
            });
        }

        // Past this point nothing can fail.
        if let Some(record) = T::collection_mut(self).record_mut(old) {
            record.value.set_name(new.to_string());
        }
        let old_ref = EntityRef::new(T::KIND, old);
        let new_ref = EntityRef::new(T::KIND, new);
        self.graph.forget(&old_ref);
        self.record_edges(&new_ref);
        for dependent in &direct {
            let dependent = if *dependent == old_ref {
                new_ref.clone()
            } else {
                dependent.clone()
            };
            dispatch_mut!(self, dependent.kind, |c| {
                if let Some(record) = c.record_mut(&dependent.name) {
                    record.value.rename_reference(namespace, old, new);
                }
            });
            self.record_edges(&dependent);
        }
        self.invalidate(&new_ref, true);
        debug!(kind = %T::KIND, old, new, dependents = direct.len(), "entity renamed");
        self.emit(T::KIND, CollectionEvent::Renamed, new, Some(old));
        Ok(())
    }

    /// Remove an entity. Dependents keep their references and become
    /// invalid on the next validation.
    pub fn remove<T: Entity>(&mut self, name: &str) -> Result<T> {
        let entity = EntityRef::new(T::KIND, name);
        if !T::collection(self).contains(name) {
            return Err(not_found(T::KIND, name));
        }
        self.invalidate(&entity, false);
        let removed = T::collection_mut(self)
            .take(name)
            .ok_or_else(|| not_found(T::KIND, name))?;
        self.graph.forget(&entity);
        self.level = ValidationLevel::Unknown;
        debug!(kind = %T::KIND, name, "entity removed");
        self.emit(T::KIND, CollectionEvent::Erased, name, None);
        Ok(removed)
    }

    pub fn subscribe<F>(&mut self, filter: EventFilter, callback: F) -> SubscriptionId
    where
        F: FnMut(&ModelEvent) -> EventResponse + Send + 'static,
    {
        self.subscribers.subscribe(filter, Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Recompute the level of every entity whose state is unknown and
    /// return the level of the whole definition.
    pub fn validate(&mut self) -> ValidationLevel {
        let verdicts = Validator::new(self).run();
        let computed = verdicts.len();
        for (entity, (level, problems)) in verdicts {
            dispatch_mut!(self, entity.kind, |c| {
                if let Some(record) = c.record_mut(&entity.name) {
                    record.info.level = level;
                    record.info.problems = problems;
                }
            });
        }
        self.level = self
            .entity_refs()
            .map(|entity| self.level_of(&entity))
            .min()
            .unwrap_or(ValidationLevel::Valid);
        debug!(computed, level = %self.level, "data definition validated");
        self.level
    }

    /// Level from the last [`DataDefinition::validate`]; `Unknown` after
    /// any change.
    pub fn validation_level(&self) -> ValidationLevel {
        self.level
    }

    /// Every problem recorded on any entity by the last validation.
    pub fn problems(&self) -> Vec<Problem> {
        self.entity_refs()
            .filter_map(|entity| self.info_of(&entity).map(|i| i.problems().to_vec()))
            .flatten()
            .collect()
    }

    fn references_of(&self, entity: &EntityRef) -> Vec<Reference> {
        dispatch!(self, entity.kind, |c| c
            .get(&entity.name)
            .map(|value| value.references())
            .unwrap_or_default())
    }

    fn record_edges(&mut self, entity: &EntityRef) {
        let mut edges: Vec<(DependencyKind, String)> = self
            .references_of(entity)
            .into_iter()
            .map(|reference| {
                let resolved = self.kind_of(reference.namespace, &reference.name);
                (
                    DependencyKind::classify(entity.kind, &reference, resolved),
                    reference.name,
                )
            })
            .collect();
        edges.sort();
        edges.dedup();
        self.graph.record(entity.clone(), edges);
    }

    /// Reset `root` (optionally) and everything that transitively depends
    /// on it to `Unknown`, dropping cached extensions.
    fn invalidate(&mut self, root: &EntityRef, include_root: bool) {
        let affected = self.graph.transitive_dependents(root);
        if include_root {
            self.reset_info(root);
        }
        for entity in &affected {
            // A dependent's classification may change once the name resolves.
            self.record_edges(entity);
            self.reset_info(entity);
            self.emit(entity.kind, CollectionEvent::Invalidated, &entity.name, None);
        }
        self.level = ValidationLevel::Unknown;
    }

    fn reset_info(&mut self, entity: &EntityRef) {
        dispatch_mut!(self, entity.kind, |c| {
            if let Some(record) = c.record_mut(&entity.name) {
                record.info.reset();
            }
        });
    }

    fn emit(&mut self, kind: EntityKind, event: CollectionEvent, name: &str, old: Option<&str>) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = ModelEvent {
            kind,
            code: translate(event),
            name: name.to_string(),
            old_name: old.map(str::to_string),
        };
        self.subscribers.notify(&event);
    }
}

fn not_found(kind: EntityKind, name: &str) -> ModelError {
    ModelError::NotFound {
        kind,
        name: name.to_string(),
    }
}
