use std::sync::{Arc, Mutex};
use std::time::Duration;

use ddlkit_codec::{CodecFactory, Representation, ResultCode, Status, Value};
use ddlkit_mapping::{
    EngineConfig, MapConfiguration, MappingEngine, MappingEnvironment, MappingError,
    PeriodicListener, Polynomial, TargetHandle,
};
use ddlkit_model::DdlReader;

const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ddl>
  <header>
    <language_version>4.1</language_version>
    <author>mapping tests</author>
    <date_creation>2026-01-01</date_creation>
    <date_change>2026-01-01</date_change>
    <description>mapping fixtures</description>
  </header>
  <datatypes>
    <datatype name="tBool" size="8"/>
    <datatype name="tUInt8" size="8"/>
    <datatype name="tUInt16" size="16"/>
    <datatype name="tInt32" size="32"/>
    <datatype name="tFloat32" size="32"/>
    <datatype name="tFloat64" size="64"/>
  </datatypes>
  <structs>
    <struct name="Pos" version="1">
      <element name="x" type="tInt32" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="4"/></element>
      <element name="y" type="tInt32" arraysize="1"><serialized bytepos="4" byteorder="LE"/><deserialized alignment="4"/></element>
    </struct>
    <struct name="Scaled" version="1">
      <element name="x" type="tFloat64" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="8"/></element>
      <element name="y" type="tFloat64" arraysize="1"><serialized bytepos="8" byteorder="LE"/><deserialized alignment="8"/></element>
      <element name="n" type="tUInt16" arraysize="1"><serialized bytepos="16" byteorder="LE"/><deserialized alignment="2"/></element>
      <element name="fresh" type="tBool" arraysize="1"><serialized bytepos="18" byteorder="LE"/><deserialized alignment="1"/></element>
      <element name="kind" type="tUInt8" arraysize="1"><serialized bytepos="19" byteorder="LE"/><deserialized alignment="1"/></element>
    </struct>
    <struct name="Flat" version="1">
      <element name="x" type="tFloat32" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="4"/></element>
      <element name="y" type="tFloat32" arraysize="1"><serialized bytepos="4" byteorder="LE"/><deserialized alignment="4"/></element>
    </struct>
  </structs>
</ddl>
"#;

const MAPPING: &str = r#"<mapping>
  <header><language_version>1.00</language_version></header>
  <sources>
    <source name="pos" type="Pos"/>
    <source name="ghost" type="Ghost"/>
  </sources>
  <targets>
    <target name="scaled" type="Scaled">
      <assignment to="x" from="pos.x" transformation="half"/>
      <assignment to="y" from="pos.y" transformation="half"/>
      <assignment to="n" function="trigger_counter()"/>
      <assignment to="fresh" function="received(pos)"/>
      <assignment to="kind" constant="3"/>
      <trigger type="signal" variable="pos"/>
    </target>
    <target name="watch" type="Scaled">
      <assignment to="x" from="pos.x"/>
      <trigger type="signal" variable="pos"/>
      <trigger type="periodic" period="100" unit="ms"/>
    </target>
    <target name="limit" type="Scaled">
      <assignment to="x" from="pos.x"/>
      <trigger type="data" variable="pos.x" operator="greater_than" value="100"/>
    </target>
    <target name="flat" type="Flat">
      <assignment to="x" from="pos.x" transformation="half"/>
      <assignment to="y" from="pos.y" transformation="half"/>
      <trigger type="signal" variable="pos"/>
    </target>
    <target name="orphan" type="Missing">
      <assignment to="x" from="pos.x"/>
      <trigger type="signal" variable="pos"/>
    </target>
    <target name="broken" type="Scaled">
      <assignment to="x" from="ghost.x"/>
      <trigger type="periodic" period="50"/>
    </target>
  </targets>
  <transformations>
    <polynomial name="half" b="0.5"/>
  </transformations>
</mapping>
"#;

type Timer = (Duration, Arc<dyn PeriodicListener>);

#[derive(Default)]
struct Host {
    sent: Mutex<Vec<(TargetHandle, Vec<u8>)>>,
    sources: Mutex<Vec<String>>,
    timers: Mutex<Vec<Timer>>,
    mapped: Mutex<Vec<String>>,
    reject_target: Mutex<Option<String>>,
}

impl Host {
    fn sent(&self) -> Vec<(TargetHandle, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    fn timers(&self) -> Vec<Timer> {
        self.timers.lock().unwrap().clone()
    }
}

fn same_listener(a: &Arc<dyn PeriodicListener>, b: &Arc<dyn PeriodicListener>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

impl MappingEnvironment for Host {
    fn resolve_type(&self, type_name: &str) -> Option<String> {
        matches!(type_name, "Pos" | "Scaled" | "Flat").then(|| SCHEMA.to_string())
    }

    fn register_source(&self, source: &str, _type_name: &str) -> Status {
        self.sources.lock().unwrap().push(source.to_string());
        Status::OK
    }

    fn unregister_source(&self, source: &str) -> Status {
        self.sources.lock().unwrap().retain(|s| s != source);
        Status::OK
    }

    fn send_target(&self, target: TargetHandle, data: &[u8]) -> Status {
        self.sent.lock().unwrap().push((target, data.to_vec()));
        Status::OK
    }

    fn target_mapped(&self, target: &str, _type_name: &str, _handle: TargetHandle) -> Status {
        if self.reject_target.lock().unwrap().as_deref() == Some(target) {
            return Status::with_detail(ResultCode::Failed, "rejected by host");
        }
        self.mapped.lock().unwrap().push(target.to_string());
        Status::OK
    }

    fn target_unmapped(&self, target: &str, _handle: TargetHandle) -> Status {
        self.mapped.lock().unwrap().retain(|t| t != target);
        Status::OK
    }

    fn time(&self) -> Duration {
        Duration::from_millis(1500)
    }

    fn register_periodic_timer(&self, period: Duration, listener: Arc<dyn PeriodicListener>) -> Status {
        self.timers.lock().unwrap().push((period, listener));
        Status::OK
    }

    fn unregister_periodic_timer(
        &self,
        period: Duration,
        listener: &Arc<dyn PeriodicListener>,
    ) -> Status {
        let mut timers = self.timers.lock().unwrap();
        let before = timers.len();
        timers.retain(|(p, l)| !(*p == period && same_listener(l, listener)));
        if timers.len() == before {
            return Status::from(ResultCode::NotFound);
        }
        Status::OK
    }
}

fn engine() -> (Arc<Host>, MappingEngine) {
    let host = Arc::new(Host::default());
    let config = MapConfiguration::parse(MAPPING).unwrap();
    let engine = MappingEngine::new(EngineConfig::default(), config, host.clone());
    (host, engine)
}

fn pos(x: i32, y: i32) -> Vec<u8> {
    let mut sample = x.to_ne_bytes().to_vec();
    sample.extend_from_slice(&y.to_ne_bytes());
    sample
}

fn scaled(data: &[u8], path: &str) -> Value {
    let loaded = DdlReader::new().read_str(SCHEMA).unwrap();
    let factory = CodecFactory::new(&loaded.definition, "Scaled");
    let decoder = factory
        .make_decoder(data, Representation::Deserialized)
        .unwrap();
    decoder.get_by_path(path).unwrap()
}

fn table_sizes(engine: &MappingEngine) -> (usize, usize, usize) {
    (engine.source_count(), engine.target_count(), engine.trigger_count())
}

#[test]
fn samples_are_transformed_and_transmitted() {
    let (host, mut engine) = engine();
    let handle = engine.map("scaled").unwrap();
    assert_eq!(host.sources.lock().unwrap().as_slice(), ["pos"]);
    assert_eq!(host.mapped.lock().unwrap().as_slice(), ["scaled"]);

    let initial = engine.get_current_data(handle).unwrap();
    assert_eq!(initial.len(), 24);
    assert_eq!(scaled(&initial, "kind"), Value::UInt(3));

    engine.start().unwrap();
    engine.on_sample_received("pos", &pos(10, 20)).unwrap();

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    let (sent_handle, data) = &sent[0];
    assert_eq!(*sent_handle, handle);
    assert_eq!(scaled(data, "x"), Value::Float(5.0));
    assert_eq!(scaled(data, "y"), Value::Float(10.0));
    assert_eq!(scaled(data, "n"), Value::UInt(1));
    assert_eq!(scaled(data, "fresh"), Value::Bool(true));

    let current = engine.get_current_data(handle).unwrap();
    assert_eq!(scaled(&current, "x"), Value::Float(5.0));
    assert_eq!(scaled(&current, "fresh"), Value::Bool(false));

    engine.on_sample_received("pos", &pos(-4, 0)).unwrap();
    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(scaled(&sent[1].1, "x"), Value::Float(-2.0));
    assert_eq!(scaled(&sent[1].1, "n"), Value::UInt(2));
}

#[test]
fn stopped_engines_update_buffers_without_transmitting() {
    let (host, mut engine) = engine();
    let handle = engine.map("scaled").unwrap();
    engine.on_sample_received("pos", &pos(8, 2)).unwrap();
    assert!(host.sent().is_empty());
    let current = engine.get_current_data(handle).unwrap();
    assert_eq!(scaled(&current, "x"), Value::Float(4.0));
    assert_eq!(scaled(&current, "fresh"), Value::Bool(true));

    engine.reset().unwrap();
    let current = engine.get_current_data(handle).unwrap();
    assert_eq!(scaled(&current, "x"), Value::Float(0.0));
    assert_eq!(scaled(&current, "fresh"), Value::Bool(false));
    assert_eq!(scaled(&current, "kind"), Value::UInt(3));
}

#[test]
fn failed_maps_leave_the_tables_unchanged() {
    let (host, mut engine) = engine();
    engine.map("scaled").unwrap();
    let before = table_sizes(&engine);

    let err = engine.map("broken").unwrap_err();
    assert!(matches!(err, MappingError::TypeNotFound(ref name) if name == "Ghost"));
    assert_eq!(err.result_code(), ResultCode::InvalidType);
    assert_eq!(table_sizes(&engine), before);
    assert_eq!(host.sources.lock().unwrap().as_slice(), ["pos"]);
    assert!(host.timers().is_empty());

    let err = engine.map("orphan").unwrap_err();
    assert!(matches!(err, MappingError::TypeNotFound(ref name) if name == "Missing"));
    assert_eq!(err.result_code(), ResultCode::InvalidType);
    assert_eq!(table_sizes(&engine), before);
    assert_eq!(host.sources.lock().unwrap().as_slice(), ["pos"]);
    assert_eq!(host.mapped.lock().unwrap().as_slice(), ["scaled"]);
    assert!(host.timers().is_empty());

    assert!(matches!(engine.map("nope"), Err(MappingError::UnknownTarget(_))));
    assert!(matches!(engine.map("scaled"), Err(MappingError::AlreadyMapped(_))));
    assert_eq!(table_sizes(&engine), before);
}

#[test]
fn host_rejection_unwinds_registrations() {
    let (host, mut engine) = engine();
    *host.reject_target.lock().unwrap() = Some("watch".to_string());

    let err = engine.map("watch").unwrap_err();
    assert!(matches!(err, MappingError::Host { .. }));
    assert_eq!(table_sizes(&engine), (0, 0, 0));
    assert!(host.sources.lock().unwrap().is_empty());
    assert!(host.timers().is_empty());

    *host.reject_target.lock().unwrap() = None;
    engine.map("watch").unwrap();
    assert_eq!(table_sizes(&engine), (1, 1, 2));
    assert_eq!(host.timers().len(), 1);
}

#[test]
fn triggers_and_sources_are_shared_and_released() {
    let (host, mut engine) = engine();
    let scaled_handle = engine.map("scaled").unwrap();
    let watch_handle = engine.map("watch").unwrap();
    assert_ne!(scaled_handle, watch_handle);
    // One source, the shared signal trigger and the periodic trigger.
    assert_eq!(table_sizes(&engine), (1, 2, 2));
    assert_eq!(engine.trigger_users(scaled_handle, 0), Some(2));
    assert_eq!(engine.trigger_users(watch_handle, 1), Some(1));

    engine.start().unwrap();
    engine.on_sample_received("pos", &pos(1, 1)).unwrap();
    assert_eq!(host.sent().len(), 2);
    engine.stop().unwrap();

    engine.unmap(scaled_handle).unwrap();
    assert_eq!(table_sizes(&engine), (1, 1, 2));
    assert_eq!(engine.trigger_users(watch_handle, 0), Some(1));
    assert!(matches!(
        engine.get_current_data(scaled_handle),
        Err(MappingError::InvalidHandle(_))
    ));

    engine.unmap(watch_handle).unwrap();
    assert_eq!(table_sizes(&engine), (0, 0, 0));
    assert!(host.sources.lock().unwrap().is_empty());
    assert!(host.timers().is_empty());
    assert!(host.mapped.lock().unwrap().is_empty());
    assert!(matches!(
        engine.unmap(watch_handle),
        Err(MappingError::InvalidHandle(_))
    ));
}

#[test]
fn periodic_triggers_fire_only_while_running() {
    let (host, mut engine) = engine();
    let handle = engine.map("watch").unwrap();
    let timers = host.timers();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].0, Duration::from_millis(100));

    timers[0].1.on_timer();
    assert!(host.sent().is_empty());

    engine.start().unwrap();
    timers[0].1.on_timer();
    timers[0].1.on_timer();
    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(h, _)| *h == handle));

    engine.stop().unwrap();
    timers[0].1.on_timer();
    assert_eq!(host.sent().len(), 2);
}

#[test]
fn data_triggers_compare_the_received_value() {
    let (host, mut engine) = engine();
    engine.map("limit").unwrap();
    engine.start().unwrap();
    engine.on_sample_received("pos", &pos(50, 0)).unwrap();
    assert!(host.sent().is_empty());
    engine.on_sample_received("pos", &pos(150, 0)).unwrap();
    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(scaled(&sent[0].1, "x"), Value::Float(150.0));
}

#[test]
fn structural_calls_require_a_stopped_engine() {
    let (_host, mut engine) = engine();
    let handle = engine.map("scaled").unwrap();
    assert!(matches!(engine.stop(), Err(MappingError::InvalidState(_))));
    engine.start().unwrap();
    assert!(engine.is_running());

    for err in [
        engine.start().unwrap_err(),
        engine.map("watch").unwrap_err(),
        engine.unmap(handle).unwrap_err(),
        engine.reset().unwrap_err(),
    ] {
        assert!(matches!(err, MappingError::InvalidState(_)), "{err}");
        assert_eq!(err.code(), ResultCode::InvalidState.code());
    }
    engine.stop().unwrap();
    engine.unmap(handle).unwrap();
}

#[test]
fn registered_transformations_take_precedence() {
    let (host, mut engine) = engine();
    engine.register_transformation("half", Arc::new(Polynomial::linear(2.0, 1.0)));
    engine.map("scaled").unwrap();
    engine.start().unwrap();
    engine.on_sample_received("pos", &pos(10, 0)).unwrap();
    assert_eq!(scaled(&host.sent()[0].1, "x"), Value::Float(21.0));
}

#[test]
fn bad_samples_are_rejected() {
    let (_host, mut engine) = engine();
    engine.map("scaled").unwrap();
    assert!(matches!(
        engine.on_sample_received("ghost", &pos(0, 0)),
        Err(MappingError::UnknownSource(_))
    ));
    let err = engine.on_sample_received("pos", &[0u8; 3]).unwrap_err();
    assert_eq!(err.result_code(), ResultCode::OutOfRange);
}

#[test]
fn serialized_samples_map_to_float_targets() {
    let host = Arc::new(Host::default());
    let config = MapConfiguration::parse(MAPPING).unwrap();
    let engine_config = EngineConfig {
        representation: Representation::Serialized,
        ..EngineConfig::default()
    };
    let mut engine = MappingEngine::new(engine_config, config, host.clone());
    let handle = engine.map("flat").unwrap();
    engine.start().unwrap();

    let mut sample = 10i32.to_le_bytes().to_vec();
    sample.extend_from_slice(&20i32.to_le_bytes());
    engine.on_sample_received("pos", &sample).unwrap();

    let data = engine.get_current_data(handle).unwrap();
    assert_eq!(data.len(), 8);
    assert_eq!(&data[..4], &5.0f32.to_le_bytes());
    assert_eq!(&data[4..], &10.0f32.to_le_bytes());

    let loaded = DdlReader::new().read_str(SCHEMA).unwrap();
    let factory = CodecFactory::new(&loaded.definition, "Flat");
    let decoder = factory.make_decoder(&data, Representation::Serialized).unwrap();
    assert_eq!(decoder.get_by_path("x").unwrap(), Value::Float(5.0));
    assert_eq!(decoder.get_by_path("y").unwrap(), Value::Float(10.0));
    assert_eq!(host.sent().len(), 1);
}
