//! Mapping configuration documents.
//!
//! ```text
//! <mapping>
//!   <header>...</header>
//!   <sources><source name="pos" type="Pos"/></sources>
//!   <targets>
//!     <target name="scaled" type="Scaled">
//!       <assignment to="x" from="pos.x" transformation="half"/>
//!       <assignment to="n" function="trigger_counter(10)"/>
//!       <trigger type="signal" variable="pos"/>
//!     </target>
//!   </targets>
//!   <transformations><polynomial name="half" b="0.5"/></transformations>
//! </mapping>
//! ```

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ddlkit_codec::{CodecFactory, Representation};
use ddlkit_model::{DataDefinition, EnumType, Node, Problem, StructType, XmlDocument};
use serde::Serialize;
use tracing::debug;

use crate::error::{MappingError, Result};

/// Runtime options of a [`MappingEngine`](crate::MappingEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Representation of source samples and target buffers.
    pub representation: Representation,
    /// Upper bound for type descriptions returned by the host.
    pub max_type_document_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            representation: Representation::Deserialized,
            max_type_document_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapHeader {
    pub language_version: String,
    pub author: String,
    pub date_creation: String,
    pub date_change: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSource {
    pub name: String,
    pub type_name: String,
}

/// Generated values of a target element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum MapFunction {
    /// Host time in microseconds at transmission.
    SimulationTime,
    /// Number of transmissions, optionally wrapped.
    TriggerCounter { modulo: Option<u64> },
    /// Whether the source delivered a sample since the last transmission.
    Received { source: String },
}

impl FromStr for MapFunction {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MappingError::Configuration(format!("unknown function '{s}'"));
        let text = s.trim();
        let open = text.find('(').ok_or_else(invalid)?;
        let argument = text[open + 1..]
            .strip_suffix(')')
            .ok_or_else(invalid)?
            .trim();
        match &text[..open] {
            "simulation_time" if argument.is_empty() => Ok(MapFunction::SimulationTime),
            "trigger_counter" if argument.is_empty() => {
                Ok(MapFunction::TriggerCounter { modulo: None })
            }
            "trigger_counter" => {
                let modulo = argument.parse::<u64>().ok().filter(|m| *m > 0);
                Ok(MapFunction::TriggerCounter {
                    modulo: Some(modulo.ok_or_else(invalid)?),
                })
            }
            "received" if !argument.is_empty() => Ok(MapFunction::Received {
                source: argument.to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for MapFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapFunction::SimulationTime => f.write_str("simulation_time()"),
            MapFunction::TriggerCounter { modulo: None } => f.write_str("trigger_counter()"),
            MapFunction::TriggerCounter { modulo: Some(m) } => write!(f, "trigger_counter({m})"),
            MapFunction::Received { source } => write!(f, "received({source})"),
        }
    }
}

/// Where an assigned target element gets its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssignmentSource {
    /// `source.element.path`, optionally transformed.
    Signal {
        source: String,
        element: String,
        transformation: Option<String>,
    },
    Constant(String),
    Function(MapFunction),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapAssignment {
    /// Element path in the target type.
    pub to: String,
    pub from: AssignmentSource,
}

impl MapAssignment {
    pub fn signal(to: impl Into<String>, source: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: AssignmentSource::Signal {
                source: source.into(),
                element: element.into(),
                transformation: None,
            },
        }
    }

    pub fn with_transformation(mut self, name: impl Into<String>) -> Self {
        if let AssignmentSource::Signal { transformation, .. } = &mut self.from {
            *transformation = Some(name.into());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Comparator {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Less => value < threshold,
            Comparator::Greater => value > threshold,
            Comparator::LessEqual => value <= threshold,
            Comparator::GreaterEqual => value >= threshold,
            Comparator::Equal => value == threshold,
            Comparator::NotEqual => value != threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Less => "less_than",
            Comparator::Greater => "greater_than",
            Comparator::LessEqual => "less_than_equal",
            Comparator::GreaterEqual => "greater_than_equal",
            Comparator::Equal => "equal",
            Comparator::NotEqual => "not_equal",
        }
    }
}

impl FromStr for Comparator {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "less_than" | "<" => Comparator::Less,
            "greater_than" | ">" => Comparator::Greater,
            "less_than_equal" | "<=" => Comparator::LessEqual,
            "greater_than_equal" | ">=" => Comparator::GreaterEqual,
            "equal" | "==" => Comparator::Equal,
            "not_equal" | "!=" => Comparator::NotEqual,
            other => {
                return Err(MappingError::Configuration(format!(
                    "unknown comparison operator '{other}'"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MapTrigger {
    Periodic(Duration),
    /// Fires on every sample of the source.
    Signal { source: String },
    /// Fires on samples whose element satisfies the comparison.
    Data {
        source: String,
        element: String,
        comparator: Comparator,
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapTarget {
    pub name: String,
    pub type_name: String,
    pub assignments: Vec<MapAssignment>,
    pub triggers: Vec<MapTrigger>,
}

impl MapTarget {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            assignments: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: MapAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn with_trigger(mut self, trigger: MapTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Names of every source this target reads, in first-use order.
    pub fn referenced_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let signals = self.assignments.iter().filter_map(|a| match &a.from {
            AssignmentSource::Signal { source, .. }
            | AssignmentSource::Function(MapFunction::Received { source }) => Some(source.as_str()),
            _ => None,
        });
        let triggers = self.triggers.iter().filter_map(|t| match t {
            MapTrigger::Signal { source } | MapTrigger::Data { source, .. } => Some(source.as_str()),
            MapTrigger::Periodic(_) => None,
        });
        for name in signals.chain(triggers) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MapTransformation {
    /// `a + b*x + c*x^2 + d*x^3 + e*x^4`
    Polynomial {
        name: String,
        coefficients: [f64; 5],
    },
    /// Maps enumerators of one enum onto another by name.
    EnumTable {
        name: String,
        from_enum: String,
        to_enum: String,
        default: String,
        conversions: Vec<(String, String)>,
    },
}

impl MapTransformation {
    pub fn name(&self) -> &str {
        match self {
            MapTransformation::Polynomial { name, .. } | MapTransformation::EnumTable { name, .. } => {
                name
            }
        }
    }
}

/// A complete mapping configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapConfiguration {
    pub header: MapHeader,
    pub sources: Vec<MapSource>,
    pub targets: Vec<MapTarget>,
    pub transformations: Vec<MapTransformation>,
}

impl MapConfiguration {
    pub fn source(&self, name: &str) -> Option<&MapSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn target(&self, name: &str) -> Option<&MapTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn transformation(&self, name: &str) -> Option<&MapTransformation> {
        self.transformations.iter().find(|t| t.name() == name)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let document = XmlDocument::parse(text)?;
        Self::from_node(document.root())
    }

    /// Read a mapping document of at most `max_size` bytes.
    pub fn read_file(path: &Path, max_size: usize) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        if size > max_size as u64 {
            return Err(MappingError::Configuration(format!(
                "document too large ({size} bytes, max {max_size})"
            )));
        }
        let read_limit = u64::try_from(max_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut text = String::new();
        file.take(read_limit).read_to_string(&mut text)?;
        debug!(path = %path.display(), bytes = text.len(), "read mapping document");
        Self::parse(&text)
    }

    pub fn from_node(root: &Node) -> Result<Self> {
        if root.name() != "mapping" {
            return Err(MappingError::Configuration(format!(
                "unexpected root element '{}'",
                root.name()
            )));
        }
        let mut config = MapConfiguration::default();
        if let Some(header) = root.child("header") {
            let text = |name: &str| header.child_data(name).unwrap_or_default().trim().to_string();
            config.header = MapHeader {
                language_version: text("language_version"),
                author: text("author"),
                date_creation: text("date_creation"),
                date_change: text("date_change"),
                description: text("description"),
            };
        }
        for node in root.find_nodes("sources/source") {
            config.sources.push(MapSource {
                name: required(node, "name")?.to_string(),
                type_name: required(node, "type")?.to_string(),
            });
        }
        for node in root.find_nodes("targets/target") {
            config.targets.push(parse_target(node)?);
        }
        if let Some(transformations) = root.child("transformations") {
            for node in transformations.children() {
                config.transformations.push(parse_transformation(node)?);
            }
        }
        debug!(
            sources = config.sources.len(),
            targets = config.targets.len(),
            transformations = config.transformations.len(),
            "mapping configuration parsed"
        );
        Ok(config)
    }

    pub fn to_document(&self) -> XmlDocument {
        let mut root = Node::new("mapping");
        let header = root.create_child("header");
        header
            .create_child("language_version")
            .set_data(self.header.language_version.as_str());
        header.create_child("author").set_data(self.header.author.as_str());
        header
            .create_child("date_creation")
            .set_data(self.header.date_creation.as_str());
        header
            .create_child("date_change")
            .set_data(self.header.date_change.as_str());
        header
            .create_child("description")
            .set_data(self.header.description.as_str());

        let sources = root.create_child("sources");
        for source in &self.sources {
            sources.push_child(
                Node::new("source")
                    .with_attribute("name", source.name.as_str())
                    .with_attribute("type", source.type_name.as_str()),
            );
        }

        let targets = root.create_child("targets");
        for target in &self.targets {
            let node = targets.create_child("target");
            node.set_attribute("name", target.name.as_str());
            node.set_attribute("type", target.type_name.as_str());
            for assignment in &target.assignments {
                let child = node.create_child("assignment");
                child.set_attribute("to", assignment.to.as_str());
                match &assignment.from {
                    AssignmentSource::Signal {
                        source,
                        element,
                        transformation,
                    } => {
                        child.set_attribute("from", format!("{source}.{element}"));
                        if let Some(transformation) = transformation {
                            child.set_attribute("transformation", transformation.as_str());
                        }
                    }
                    AssignmentSource::Constant(value) => {
                        child.set_attribute("constant", value.as_str())
                    }
                    AssignmentSource::Function(function) => {
                        child.set_attribute("function", function.to_string())
                    }
                }
            }
            for trigger in &target.triggers {
                let child = node.create_child("trigger");
                match trigger {
                    MapTrigger::Periodic(period) => {
                        child.set_attribute("type", "periodic");
                        let (value, unit) = split_period(*period);
                        child.set_attribute("period", value.to_string());
                        child.set_attribute("unit", unit);
                    }
                    MapTrigger::Signal { source } => {
                        child.set_attribute("type", "signal");
                        child.set_attribute("variable", source.as_str());
                    }
                    MapTrigger::Data {
                        source,
                        element,
                        comparator,
                        value,
                    } => {
                        child.set_attribute("type", "data");
                        child.set_attribute("variable", format!("{source}.{element}"));
                        child.set_attribute("operator", comparator.as_str());
                        child.set_attribute("value", value.to_string());
                    }
                }
            }
        }

        let transformations = root.create_child("transformations");
        for transformation in &self.transformations {
            match transformation {
                MapTransformation::Polynomial { name, coefficients } => {
                    let node = transformations.create_child("polynomial");
                    node.set_attribute("name", name.as_str());
                    for (key, value) in ["a", "b", "c", "d", "e"].iter().zip(coefficients) {
                        if *value != 0.0 {
                            node.set_attribute(*key, value.to_string());
                        }
                    }
                }
                MapTransformation::EnumTable {
                    name,
                    from_enum,
                    to_enum,
                    default,
                    conversions,
                } => {
                    let node = transformations.create_child("enum_table");
                    node.set_attribute("name", name.as_str());
                    node.set_attribute("from", from_enum.as_str());
                    node.set_attribute("to", to_enum.as_str());
                    node.set_attribute("default", default.as_str());
                    for (from, to) in conversions {
                        let child = node.create_child("conversion");
                        child.set_attribute("from", from.as_str());
                        child.set_attribute("to", to.as_str());
                    }
                }
            }
        }
        XmlDocument::new(root)
    }

    /// Problems that would make mapping fail against `definition`.
    ///
    /// `definition` must be validated; unvalidated structs are reported as
    /// unusable.
    pub fn check_consistency(&self, definition: &DataDefinition) -> Vec<Problem> {
        let mut problems = Vec::new();
        let factory = |type_name: &str, context: String, problems: &mut Vec<Problem>| {
            if !definition.contains::<StructType>(type_name) {
                problems.push(Problem::new(context, format!("unknown struct type '{type_name}'")));
                return None;
            }
            let factory = CodecFactory::new(definition, type_name);
            if !factory.is_valid() {
                problems.push(Problem::new(context, format!("struct type '{type_name}' is not usable")));
                return None;
            }
            Some(factory)
        };

        let mut source_factories = Vec::new();
        for source in &self.sources {
            let context = format!("source '{}'", source.name);
            source_factories.push((
                source.name.as_str(),
                factory(source.type_name.as_str(), context, &mut problems),
            ));
        }
        let source_factory = |name: &str| {
            source_factories
                .iter()
                .find(|(source, _)| *source == name)
                .map(|(_, factory)| factory.as_ref())
        };
        let check_element = |source: &str, element: &str, context: &str, problems: &mut Vec<Problem>| {
            match source_factory(source) {
                None => problems.push(Problem::new(context, format!("unknown source '{source}'"))),
                Some(Some(factory)) => {
                    if let Err(err) = factory.resolve(element) {
                        problems.push(Problem::new(context, err.to_string()));
                    }
                }
                Some(None) => {}
            }
        };

        for target in &self.targets {
            let context = format!("target '{}'", target.name);
            let target_factory = factory(target.type_name.as_str(), context.clone(), &mut problems);
            for assignment in &target.assignments {
                let context = format!("{context} assignment '{}'", assignment.to);
                if let Some(factory) = &target_factory {
                    if let Err(err) = factory.resolve(&assignment.to) {
                        problems.push(Problem::new(context.as_str(), err.to_string()));
                    }
                }
                match &assignment.from {
                    AssignmentSource::Signal {
                        source,
                        element,
                        transformation,
                    } => {
                        check_element(source.as_str(), element.as_str(), &context, &mut problems);
                        if let Some(name) = transformation {
                            if self.transformation(name).is_none() {
                                problems.push(Problem::new(
                                    context.as_str(),
                                    format!("unknown transformation '{name}'"),
                                ));
                            }
                        }
                    }
                    AssignmentSource::Function(MapFunction::Received { source }) => {
                        if self.source(source).is_none() {
                            problems.push(Problem::new(
                                context.as_str(),
                                format!("unknown source '{source}'"),
                            ));
                        }
                    }
                    AssignmentSource::Constant(_) | AssignmentSource::Function(_) => {}
                }
            }
            for trigger in &target.triggers {
                match trigger {
                    MapTrigger::Periodic(period) if period.is_zero() => problems.push(Problem::new(
                        context.as_str(),
                        "periodic trigger with zero period",
                    )),
                    MapTrigger::Periodic(_) => {}
                    MapTrigger::Signal { source } => {
                        if self.source(source).is_none() {
                            problems.push(Problem::new(
                                context.as_str(),
                                format!("trigger on unknown source '{source}'"),
                            ));
                        }
                    }
                    MapTrigger::Data { source, element, .. } => {
                        check_element(source.as_str(), element.as_str(), &context, &mut problems)
                    }
                }
            }
        }

        for transformation in &self.transformations {
            if let MapTransformation::EnumTable {
                name,
                from_enum,
                to_enum,
                default,
                conversions,
            } = transformation
            {
                let context = format!("transformation '{name}'");
                let from = definition.get::<EnumType>(from_enum);
                let to = definition.get::<EnumType>(to_enum);
                if from.is_none() {
                    problems.push(Problem::new(context.as_str(), format!("unknown enum '{from_enum}'")));
                }
                match to {
                    None => problems.push(Problem::new(context.as_str(), format!("unknown enum '{to_enum}'"))),
                    Some(to) if to.value_of(default).is_none() => problems.push(Problem::new(
                        context.as_str(),
                        format!("'{default}' is not an element of '{to_enum}'"),
                    )),
                    Some(_) => {}
                }
                for (from_name, to_name) in conversions {
                    if from.is_some_and(|e| e.value_of(from_name).is_none())
                        || to.is_some_and(|e| e.value_of(to_name).is_none())
                    {
                        problems.push(Problem::new(
                            context.as_str(),
                            format!("invalid conversion '{from_name}' -> '{to_name}'"),
                        ));
                    }
                }
            }
        }
        problems
    }
}

fn required<'n>(node: &'n Node, key: &str) -> Result<&'n str> {
    node.attribute(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            MappingError::Configuration(format!("<{}> is missing attribute '{key}'", node.name()))
        })
}

fn split_variable(variable: &str) -> Result<(String, String)> {
    variable
        .split_once('.')
        .filter(|(source, element)| !source.is_empty() && !element.is_empty())
        .map(|(source, element)| (source.to_string(), element.to_string()))
        .ok_or_else(|| {
            MappingError::Configuration(format!(
                "'{variable}' is not of the form <source>.<element>"
            ))
        })
}

fn parse_number(node: &Node, key: &str) -> Result<f64> {
    match node.attribute(key).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(0.0),
        Some(text) => text.parse::<f64>().map_err(|_| {
            MappingError::Configuration(format!("invalid number '{text}' for '{key}'"))
        }),
    }
}

fn parse_target(node: &Node) -> Result<MapTarget> {
    let mut target = MapTarget::new(required(node, "name")?, required(node, "type")?);
    for child in node.children_named("assignment") {
        let to = required(child, "to")?.to_string();
        let from = match (
            child.attribute("from"),
            child.attribute("constant"),
            child.attribute("function"),
        ) {
            (Some(from), None, None) => {
                let (source, element) = split_variable(from)?;
                AssignmentSource::Signal {
                    source,
                    element,
                    transformation: child
                        .attribute("transformation")
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                }
            }
            (None, Some(constant), None) => AssignmentSource::Constant(constant.to_string()),
            (None, None, Some(function)) => AssignmentSource::Function(function.parse()?),
            _ => {
                return Err(MappingError::Configuration(format!(
                    "assignment to '{to}' needs exactly one of from, constant or function"
                )))
            }
        };
        target.assignments.push(MapAssignment { to, from });
    }
    for child in node.children_named("trigger") {
        let trigger = match required(child, "type")? {
            "periodic" => {
                let period = required(child, "period")?;
                let period = period.trim().parse::<u64>().map_err(|_| {
                    MappingError::Configuration(format!("invalid period '{period}'"))
                })?;
                MapTrigger::Periodic(period_duration(period, child.attribute("unit").unwrap_or("ms"))?)
            }
            "signal" => MapTrigger::Signal {
                source: required(child, "variable")?.to_string(),
            },
            "data" => {
                let (source, element) = split_variable(required(child, "variable")?)?;
                MapTrigger::Data {
                    source,
                    element,
                    comparator: required(child, "operator")?.parse()?,
                    value: parse_number(child, "value")?,
                }
            }
            other => {
                return Err(MappingError::Configuration(format!(
                    "unknown trigger type '{other}'"
                )))
            }
        };
        target.triggers.push(trigger);
    }
    Ok(target)
}

fn parse_transformation(node: &Node) -> Result<MapTransformation> {
    match node.name() {
        "polynomial" => Ok(MapTransformation::Polynomial {
            name: required(node, "name")?.to_string(),
            coefficients: [
                parse_number(node, "a")?,
                parse_number(node, "b")?,
                parse_number(node, "c")?,
                parse_number(node, "d")?,
                parse_number(node, "e")?,
            ],
        }),
        "enum_table" => Ok(MapTransformation::EnumTable {
            name: required(node, "name")?.to_string(),
            from_enum: required(node, "from")?.to_string(),
            to_enum: required(node, "to")?.to_string(),
            default: required(node, "default")?.to_string(),
            conversions: node
                .children_named("conversion")
                .map(|c| Ok((required(c, "from")?.to_string(), required(c, "to")?.to_string())))
                .collect::<Result<_>>()?,
        }),
        other => Err(MappingError::Configuration(format!(
            "unknown transformation <{other}>"
        ))),
    }
}

fn period_duration(value: u64, unit: &str) -> Result<Duration> {
    Ok(match unit.trim() {
        "ns" => Duration::from_nanos(value),
        "us" => Duration::from_micros(value),
        "ms" | "" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        other => {
            return Err(MappingError::Configuration(format!(
                "unknown time unit '{other}'"
            )))
        }
    })
}

fn split_period(period: Duration) -> (u128, &'static str) {
    let nanos = period.as_nanos();
    if nanos % 1_000_000_000 == 0 {
        (nanos / 1_000_000_000, "s")
    } else if nanos % 1_000_000 == 0 {
        (nanos / 1_000_000, "ms")
    } else if nanos % 1_000 == 0 {
        (nanos / 1_000, "us")
    } else {
        (nanos, "ns")
    }
}

#[cfg(test)]
mod tests {
    use ddlkit_model::{Element, EnumType, ValidationLevel};

    use super::*;

    const MAPPING: &str = r#"<mapping>
      <header><language_version>1.00</language_version><author>tests</author></header>
      <sources>
        <source name="pos" type="Pos"/>
      </sources>
      <targets>
        <target name="scaled" type="Scaled">
          <assignment to="x" from="pos.x" transformation="half"/>
          <assignment to="y" from="pos.y" transformation="half"/>
          <assignment to="n" function="trigger_counter(4)"/>
          <assignment to="fresh" function="received(pos)"/>
          <assignment to="kind" constant="2"/>
          <trigger type="periodic" period="250" unit="ms"/>
          <trigger type="signal" variable="pos"/>
          <trigger type="data" variable="pos.x" operator="greater_than" value="10"/>
        </target>
      </targets>
      <transformations>
        <polynomial name="half" b="0.5"/>
        <enum_table name="gears" from="GearA" to="GearB" default="OFF">
          <conversion from="ONE" to="ON"/>
        </enum_table>
      </transformations>
    </mapping>"#;

    #[test]
    fn parses_every_part() {
        let config = MapConfiguration::parse(MAPPING).unwrap();
        assert_eq!(config.header.author, "tests");
        assert_eq!(config.sources.len(), 1);
        let target = config.target("scaled").unwrap();
        assert_eq!(target.assignments.len(), 5);
        assert_eq!(
            target.assignments[2].from,
            AssignmentSource::Function(MapFunction::TriggerCounter { modulo: Some(4) })
        );
        assert_eq!(target.triggers[0], MapTrigger::Periodic(Duration::from_millis(250)));
        assert_eq!(
            target.triggers[2],
            MapTrigger::Data {
                source: "pos".to_string(),
                element: "x".to_string(),
                comparator: Comparator::Greater,
                value: 10.0,
            }
        );
        assert_eq!(target.referenced_sources(), ["pos"]);
        assert_eq!(
            config.transformation("half"),
            Some(&MapTransformation::Polynomial {
                name: "half".to_string(),
                coefficients: [0.0, 0.5, 0.0, 0.0, 0.0],
            })
        );
    }

    #[test]
    fn document_round_trip() {
        let config = MapConfiguration::parse(MAPPING).unwrap();
        let text = config.to_document().to_xml_string(2).unwrap();
        assert_eq!(MapConfiguration::parse(&text).unwrap(), config);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(MapConfiguration::parse("<ddl/>").is_err());
        let both = r#"<mapping><targets><target name="t" type="T">
            <assignment to="a" from="s.a" constant="1"/></target></targets></mapping>"#;
        assert!(matches!(
            MapConfiguration::parse(both),
            Err(MappingError::Configuration(_))
        ));
        let bad_trigger = r#"<mapping><targets><target name="t" type="T">
            <trigger type="sometimes"/></target></targets></mapping>"#;
        assert!(MapConfiguration::parse(bad_trigger).is_err());
        assert!("trigger_counter(0)".parse::<MapFunction>().is_err());
        assert!("received()".parse::<MapFunction>().is_err());
    }

    #[test]
    fn consistency_against_a_definition() {
        let mut dd = DataDefinition::with_predefined();
        dd.add(
            StructType::new("Pos")
                .with_element(Element::new("x", "tInt32").at_byte(0))
                .with_element(Element::new("y", "tInt32").at_byte(4)),
        )
        .unwrap();
        dd.add(
            StructType::new("Scaled")
                .with_element(Element::new("x", "tFloat32").at_byte(0))
                .with_element(Element::new("n", "tUInt8").at_byte(4))
                .with_element(Element::new("fresh", "tBool").at_byte(5))
                .with_element(Element::new("kind", "tUInt8").at_byte(6)),
        )
        .unwrap();
        dd.add(EnumType::new("GearA", "tUInt8").with_element("ONE", "1"))
            .unwrap();
        dd.add(EnumType::new("GearB", "tUInt8").with_element("ON", "1"))
            .unwrap();
        assert_eq!(dd.validate(), ValidationLevel::Valid);

        let config = MapConfiguration::parse(MAPPING).unwrap();
        let problems = config.check_consistency(&dd);
        // "y" is missing from Scaled and "OFF" from GearB.
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].context.contains("assignment 'y'"));
        assert!(problems[1].message.contains("OFF"));
    }
}
