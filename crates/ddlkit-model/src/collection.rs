use crate::entity::Entity;
use crate::error::Problem;
use crate::extension::Extensions;
use crate::validation::ValidationLevel;

/// Validation state and cached metadata of one stored entity.
#[derive(Debug, Clone, Default)]
pub struct EntityInfo {
    pub(crate) level: ValidationLevel,
    pub(crate) problems: Vec<Problem>,
    pub(crate) extensions: Extensions,
}

impl EntityInfo {
    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Cached metadata attached to the entity.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub(crate) fn reset(&mut self) {
        self.level = ValidationLevel::Unknown;
        self.problems.clear();
        self.extensions.clear();
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Record<T> {
    pub(crate) value: T,
    pub(crate) info: EntityInfo,
}

/// Insertion-ordered, name-unique set of entities of one kind.
///
/// Read access is public; mutation goes through
/// [`DataDefinition`](crate::DataDefinition) so that namespaces, dependency
/// edges and notifications stay consistent.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    records: Vec<Record<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.record(name).map(|r| &r.value)
    }

    pub fn info(&self, name: &str) -> Option<&EntityInfo> {
        self.record(name).map(|r| &r.info)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.records.iter().map(|r| &r.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.value.name())
    }

    pub(crate) fn record(&self, name: &str) -> Option<&Record<T>> {
        self.records.iter().find(|r| r.value.name() == name)
    }

    pub(crate) fn record_mut(&mut self, name: &str) -> Option<&mut Record<T>> {
        self.records.iter_mut().find(|r| r.value.name() == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.value.name() == name)
    }

    pub(crate) fn push(&mut self, value: T) {
        self.records.push(Record {
            value,
            info: EntityInfo::default(),
        });
    }

    /// Replace in place, keeping the insertion slot. Returns the old value.
    pub(crate) fn replace(&mut self, value: T) -> Option<T> {
        let record = self.record_mut(value.name())?;
        record.info.reset();
        Some(std::mem::replace(&mut record.value, value))
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<T> {
        let index = self.position(name)?;
        Some(self.records.remove(index).value)
    }
}
