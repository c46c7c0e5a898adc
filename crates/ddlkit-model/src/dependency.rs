use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::entity::{EntityKind, Namespace, Reference};

/// Identifies one entity inside a data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// The relation an edge of the dependency graph stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DependencyKind {
    UnitToBaseUnit,
    UnitToPrefix,
    DataTypeToUnit,
    EnumToDataType,
    StructToDataType,
    StructToEnum,
    StructToStruct,
    StructToUnit,
    StreamMetaToParent,
    StreamToStruct,
}

impl DependencyKind {
    /// Classify a reference held by an entity of kind `from`.
    ///
    /// `resolved` is the kind the referenced name currently resolves to;
    /// struct element types are told apart by it.
    pub fn classify(from: EntityKind, reference: &Reference, resolved: Option<EntityKind>) -> Self {
        match (from, reference.namespace) {
            (EntityKind::Unit, Namespace::Prefix) => DependencyKind::UnitToPrefix,
            (EntityKind::Unit, _) => DependencyKind::UnitToBaseUnit,
            (EntityKind::DataType, _) => DependencyKind::DataTypeToUnit,
            (EntityKind::EnumType, _) => DependencyKind::EnumToDataType,
            (EntityKind::StructType, Namespace::Unit) => DependencyKind::StructToUnit,
            (EntityKind::StructType, _) => match resolved {
                Some(EntityKind::StructType) => DependencyKind::StructToStruct,
                Some(EntityKind::EnumType) => DependencyKind::StructToEnum,
                _ => DependencyKind::StructToDataType,
            },
            (EntityKind::StreamMetaType, _) => DependencyKind::StreamMetaToParent,
            _ => DependencyKind::StreamToStruct,
        }
    }

    pub fn target_namespace(self) -> Namespace {
        match self {
            DependencyKind::UnitToBaseUnit
            | DependencyKind::DataTypeToUnit
            | DependencyKind::StructToUnit => Namespace::Unit,
            DependencyKind::UnitToPrefix => Namespace::Prefix,
            DependencyKind::EnumToDataType
            | DependencyKind::StructToDataType
            | DependencyKind::StructToEnum
            | DependencyKind::StructToStruct
            | DependencyKind::StreamToStruct => Namespace::Type,
            DependencyKind::StreamMetaToParent => Namespace::StreamMetaType,
        }
    }

    const ALL: [DependencyKind; 10] = [
        DependencyKind::UnitToBaseUnit,
        DependencyKind::UnitToPrefix,
        DependencyKind::DataTypeToUnit,
        DependencyKind::EnumToDataType,
        DependencyKind::StructToDataType,
        DependencyKind::StructToEnum,
        DependencyKind::StructToStruct,
        DependencyKind::StructToUnit,
        DependencyKind::StreamMetaToParent,
        DependencyKind::StreamToStruct,
    ];
}

/// Reverse dependency graph ("to -> from" per dependency kind).
///
/// Looking up who depends on an entity costs O(dependents). The forward
/// index only exists so stale edges can be dropped when an entity changes.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    reverse: BTreeMap<DependencyKind, HashMap<String, BTreeSet<EntityRef>>>,
    forward: HashMap<EntityRef, Vec<(DependencyKind, String)>>,
}

impl DependencyGraph {
    /// Replace every outgoing edge of `from`.
    pub(crate) fn record(&mut self, from: EntityRef, edges: Vec<(DependencyKind, String)>) {
        self.forget(&from);
        for (kind, to) in &edges {
            self.reverse
                .entry(*kind)
                .or_default()
                .entry(to.clone())
                .or_default()
                .insert(from.clone());
        }
        if !edges.is_empty() {
            self.forward.insert(from, edges);
        }
    }

    /// Drop every outgoing edge of `from`.
    pub(crate) fn forget(&mut self, from: &EntityRef) {
        let Some(edges) = self.forward.remove(from) else {
            return;
        };
        for (kind, to) in edges {
            if let Some(targets) = self.reverse.get_mut(&kind) {
                if let Some(sources) = targets.get_mut(&to) {
                    sources.remove(from);
                    if sources.is_empty() {
                        targets.remove(&to);
                    }
                }
            }
        }
    }

    /// Outgoing edges of an entity.
    pub fn dependencies(&self, from: &EntityRef) -> &[(DependencyKind, String)] {
        self.forward.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entities with an edge of `kind` pointing at `name`.
    pub fn dependents_by_kind(&self, kind: DependencyKind, name: &str) -> BTreeSet<EntityRef> {
        self.reverse
            .get(&kind)
            .and_then(|targets| targets.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Direct dependents of whatever carries `name` in `namespace`.
    pub fn dependents(&self, namespace: Namespace, name: &str) -> BTreeSet<EntityRef> {
        let mut out = BTreeSet::new();
        for kind in DependencyKind::ALL {
            if kind.target_namespace() != namespace {
                continue;
            }
            if let Some(sources) = self.reverse.get(&kind).and_then(|t| t.get(name)) {
                out.extend(sources.iter().cloned());
            }
        }
        out
    }

    /// Direct and transitive dependents of `root`, excluding `root` itself.
    pub fn transitive_dependents(&self, root: &EntityRef) -> BTreeSet<EntityRef> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current.kind.namespace(), &current.name) {
                if dependent != *root && seen.insert(dependent.clone()) {
                    queue.push_back(dependent);
                }
            }
        }
        seen
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }
}
