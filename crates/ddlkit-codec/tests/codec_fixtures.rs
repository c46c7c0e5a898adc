use ddlkit_codec::{
    transform, Codec, CodecError, CodecFactory, Representation, ResultCode, Status, Value,
    MAX_LEAF_COUNT,
};
use ddlkit_model::{ArraySize, DataDefinition, DdlReader, Element, StructType, ValidationLevel};

const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<adtf:ddl xmlns:adtf="adtf">
  <header>
    <language_version>4.1</language_version>
    <author>fixtures</author>
    <date_creation>2026-01-01</date_creation>
    <date_change>2026-01-01</date_change>
    <description>codec fixtures</description>
  </header>
  <units/>
  <datatypes>
    <datatype name="tBool" size="8"/>
    <datatype name="tUInt8" size="8"/>
    <datatype name="tInt16" size="16"/>
    <datatype name="tUInt16" size="16"/>
    <datatype name="tInt32" size="32"/>
    <datatype name="tFloat32" size="32"/>
    <datatype name="tFloat64" size="64"/>
  </datatypes>
  <enums>
    <enum name="Gear" type="tUInt8">
      <element name="PARK" value="0"/>
      <element name="DRIVE" value="3"/>
    </enum>
  </enums>
  <structs>
    <struct name="Pos" version="1">
      <element name="x" type="tInt32" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="4"/></element>
      <element name="y" type="tInt32" arraysize="1"><serialized bytepos="4" byteorder="LE"/><deserialized alignment="4"/></element>
    </struct>
    <struct name="Vehicle" version="1">
      <element name="id" type="tUInt16" arraysize="1" default="7"><serialized bytepos="0" byteorder="BE"/><deserialized alignment="2"/></element>
      <element name="gear" type="Gear" arraysize="1" default="DRIVE"><serialized bytepos="2" bitpos="0" numbits="4" byteorder="LE"/><deserialized alignment="1"/></element>
      <element name="flag" type="tBool" arraysize="1" value="1"><serialized bytepos="3" byteorder="LE"/><deserialized alignment="1"/></element>
      <element name="speed" type="tFloat64" arraysize="1"><serialized bytepos="4" byteorder="LE"/><deserialized alignment="8"/></element>
      <element name="track" type="Pos" arraysize="2"><serialized bytepos="12" byteorder="LE"/><deserialized alignment="4"/></element>
    </struct>
    <struct name="Samples" version="1">
      <element name="count" type="tUInt8" arraysize="1"><serialized bytepos="0" byteorder="LE"/><deserialized alignment="1"/></element>
      <element name="values" type="tInt16" arraysize="count"><serialized bytepos="1" byteorder="LE"/><deserialized alignment="2"/></element>
      <element name="crc" type="tUInt8" arraysize="1"><serialized bytepos="1" byteorder="LE"/><deserialized alignment="1"/></element>
    </struct>
  </structs>
</adtf:ddl>
"#;

fn definition() -> DataDefinition {
    let loaded = DdlReader::new().read_str(SCHEMA).unwrap();
    assert!(loaded.problems.is_empty(), "{:?}", loaded.problems);
    assert_eq!(loaded.level, ValidationLevel::Valid);
    loaded.definition
}

#[test]
fn static_sizes_and_paths() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    assert!(factory.is_valid());
    assert_eq!(factory.static_buffer_size(Representation::Serialized), Some(28));
    // id 0..2, gear 2, flag 3, speed 8..16, track 16..32
    assert_eq!(factory.static_buffer_size(Representation::Deserialized), Some(32));
    assert_eq!(factory.element_count(), 8);

    let y1 = factory.resolve("track[1].y").unwrap();
    assert_eq!(y1.serialized_bit_offset, (12 + 8 + 4) * 8);
    assert_eq!(y1.deserialized_offset, 16 + 8 + 4);
    assert_eq!(factory.resolve("/track[1]/y").unwrap(), ddlkit_codec::CodecIndex {
        path: "/track[1]/y".to_string(),
        ..y1.clone()
    });
    assert_eq!(factory.resolve_leaf(7).unwrap().path, "track[1].y");

    let paths: Vec<_> = factory.elements().map(|leaf| leaf.path.as_str()).collect();
    assert_eq!(
        paths,
        ["id", "gear", "flag", "speed", "track[0].x", "track[0].y", "track[1].x", "track[1].y"]
    );
}

#[test]
fn resolution_failures() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    assert!(matches!(factory.resolve("track[2].x"), Err(CodecError::IndexOutOfRange { index: 2, count: 2 })));
    assert!(matches!(factory.resolve("track[abc].x"), Err(CodecError::MalformedPath(_))));
    assert!(matches!(factory.resolve("nope"), Err(CodecError::PathNotFound(_))));
    assert!(matches!(factory.resolve("track[0]"), Err(CodecError::NotALeaf(_))));
    assert!(matches!(factory.resolve_leaf(8), Err(CodecError::IndexOutOfRange { .. })));

    let missing = CodecFactory::new(&dd, "Missing");
    assert!(!missing.is_valid());
    assert_eq!(missing.status().code(), ResultCode::NotFound.code());
    assert!(matches!(missing.resolve("x"), Err(CodecError::InvalidFactory(_))));
}

#[test]
fn serialized_access() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    let mut wire = vec![0u8; 28];
    wire[0] = 0x01;
    wire[1] = 0x02;
    wire[2] = 0xf3;
    wire[4..12].copy_from_slice(&12.5f64.to_le_bytes());
    wire[20..24].copy_from_slice(&(-9i32).to_le_bytes());

    let decoder = factory.make_decoder(&wire, Representation::Serialized).unwrap();
    assert_eq!(decoder.get::<u16, _>(0).unwrap(), 0x0102);
    assert_eq!(decoder.get_value(1).unwrap(), Value::UInt(3));
    assert_eq!(decoder.get_enum_name(1).unwrap().as_deref(), Some("DRIVE"));
    assert_eq!(decoder.get::<f64, _>(3).unwrap(), 12.5);
    assert_eq!(decoder.get_by_path("track[1].x").unwrap(), Value::Int(-9));
    assert_eq!(decoder.get::<f32, _>(6).unwrap(), -9.0);
    assert!(matches!(decoder.get::<bool, _>(0), Err(CodecError::TypeMismatch { .. })));
    assert!(matches!(decoder.get_value(8), Err(CodecError::IndexOutOfRange { .. })));
    assert_eq!(&decoder.get_raw(0).unwrap()[..], &[0x01, 0x02]);
}

#[test]
fn short_buffers_are_rejected() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    let wire = [0u8; 27];
    let err = factory
        .make_decoder(&wire, Representation::Serialized)
        .unwrap_err();
    assert!(matches!(err, CodecError::BufferTooSmall { required: 28, actual: 27 }));
    assert_eq!(Status::from(&err).code(), ResultCode::OutOfRange.code());
}

#[test]
fn codec_writes_and_resets() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    let mut host = vec![0u8; 32];
    {
        let mut codec = Codec::new(&factory, &mut host, Representation::Deserialized).unwrap();
        codec.reset_to_defaults().unwrap();
        assert_eq!(codec.get::<u16, _>(0).unwrap(), 7);
        assert_eq!(codec.get_enum_name(1).unwrap().as_deref(), Some("DRIVE"));
        assert_eq!(codec.get::<bool, _>(2).unwrap(), true);

        codec.set::<f64, _>(3, 3.25).unwrap();
        codec.set_by_path("track[0].y", Value::Float(41.9)).unwrap();
        codec.set::<i64, _>(4, -1).unwrap();
        assert!(matches!(
            codec.set_value(2, Value::Int(1)),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            codec.set_raw(0, &[1, 2, 3]),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
    assert_eq!(&host[8..16], &3.25f64.to_ne_bytes());
    assert_eq!(&host[16..20], &(-1i32).to_ne_bytes());
    assert_eq!(&host[20..24], &41i32.to_ne_bytes());
}

#[test]
fn raw_values_are_written_in_place() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Vehicle");
    let mut wire = vec![0u8; 28];
    {
        let mut codec = Codec::new(&factory, &mut wire, Representation::Serialized).unwrap();
        codec.set_raw(0, &[0xab, 0xcd]).unwrap();
        assert_eq!(&codec.get_raw(0).unwrap()[..], &[0xab, 0xcd]);
        codec.set_raw(1, &[5]).unwrap();
        assert_eq!(codec.get_value(1).unwrap(), Value::UInt(5));
    }
    assert_eq!(&wire[..3], &[0xab, 0xcd, 0x05]);
}

#[test]
fn dynamic_arrays_follow_the_buffer() {
    let dd = definition();
    let factory = CodecFactory::new(&dd, "Samples");
    assert!(factory.has_dynamic_arrays());
    assert_eq!(factory.static_buffer_size(Representation::Serialized), None);
    assert_eq!(factory.element_count(), 1);

    let wire = [3u8, 1, 0, 2, 0, 0xfd, 0xff, 0xaa];
    let decoder = factory.make_decoder(&wire, Representation::Serialized).unwrap();
    assert_eq!(decoder.element_count(), 5);
    assert_eq!(decoder.buffer_size(Representation::Serialized), 8);
    // count 0, values 2..8, crc 8, padded to 10
    assert_eq!(decoder.buffer_size(Representation::Deserialized), 10);
    assert_eq!(decoder.get_by_path("values[2]").unwrap(), Value::Int(-3));
    assert_eq!(decoder.get_by_path("crc").unwrap(), Value::UInt(0xaa));

    let host = transform(&decoder, Representation::Deserialized).unwrap();
    let host_decoder = factory.make_decoder(&host, Representation::Deserialized).unwrap();
    assert_eq!(host_decoder.get::<i16, _>(3).unwrap(), -3);
    assert_eq!(host_decoder.get::<u8, _>(4).unwrap(), 0xaa);

    let truncated = [3u8, 1, 0];
    assert!(matches!(
        factory.make_decoder(&truncated, Representation::Serialized),
        Err(CodecError::BufferTooSmall { .. })
    ));
}

#[test]
fn oversized_structs_fail_factory_creation() {
    let mut dd = DataDefinition::with_predefined();
    let count = u32::try_from(MAX_LEAF_COUNT).unwrap() + 1;
    dd.add(
        StructType::new("Blob").with_element(
            Element::new("bytes", "tUInt8")
                .at_byte(0)
                .with_array(ArraySize::Fixed(count)),
        ),
    )
    .unwrap();
    dd.add(
        StructType::new("Wide").with_element(
            Element::new("values", "tFloat64")
                .at_byte(0)
                .with_array(ArraySize::Fixed(1 << 30)),
        ),
    )
    .unwrap();
    assert_eq!(dd.validate(), ValidationLevel::Valid);

    assert!(matches!(
        CodecFactory::try_new(&dd, "Blob"),
        Err(CodecError::TooManyElements { limit: MAX_LEAF_COUNT })
    ));
    let factory = CodecFactory::new(&dd, "Blob");
    assert!(!factory.is_valid());
    assert_eq!(factory.status().code(), ResultCode::NotSupported.code());

    let wide = CodecFactory::new(&dd, "Wide");
    assert!(!wide.is_valid());
    assert_eq!(wide.status().code(), ResultCode::NotSupported.code());
}
