use ddlkit_codec::{CodecFactory, Decoder, Representation, Value};
use serde::Serialize;

use crate::cmd::{load_definition, parse_hex, DecodeArgs};
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, table, OutputFormat};

#[derive(Serialize)]
pub struct DecodedValue {
    pub path: String,
    #[serde(rename = "type")]
    pub scalar: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Serialize)]
struct DecodeOutput {
    schema_id: String,
    name: String,
    representation: Representation,
    buffer_size: usize,
    values: Vec<DecodedValue>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_definition(&args.file, args.load.reader_config())?;
    let data = parse_hex(&args.hex)?;
    let representation = Representation::from(args.representation);

    let factory = CodecFactory::try_new(&loaded.definition, &args.struct_name)
        .map_err(|err| codec_error("decode failed", err))?;
    let decoder = factory
        .make_decoder(&data, representation)
        .map_err(|err| codec_error("decode failed", err))?;

    let out = DecodeOutput {
        schema_id: schema_id("decoded-buffer"),
        name: args.struct_name,
        representation,
        buffer_size: decoder.buffer_size(representation),
        values: decode_values(&decoder)?,
    };
    print_decoded(&out.name, &out.values, format, &out);
    Ok(SUCCESS)
}

/// Read every leaf of `decoder`, with enum values resolved to their names.
pub fn decode_values(decoder: &Decoder<'_>) -> CliResult<Vec<DecodedValue>> {
    decoder
        .elements()
        .map(|index| {
            let value = decoder
                .get_value(index)
                .map_err(|err| codec_error("decode failed", err))?;
            let symbol = match index.enum_name {
                Some(_) => decoder
                    .get_enum_name(index)
                    .map_err(|err| codec_error("decode failed", err))?,
                None => None,
            };
            Ok(DecodedValue {
                path: index.path.clone(),
                scalar: index.scalar.as_str(),
                value,
                symbol,
            })
        })
        .collect()
}

/// Print `values`; JSON output serializes `json` instead.
pub fn print_decoded<T: Serialize>(
    name: &str,
    values: &[DecodedValue],
    format: OutputFormat,
    json: &T,
) {
    match format {
        OutputFormat::Json => print_json(json),
        OutputFormat::Table => {
            println!("{name}:");
            let mut rows = table(vec!["ELEMENT", "TYPE", "VALUE"]);
            for value in values {
                rows.add_row(vec![
                    value.path.clone(),
                    value.scalar.to_string(),
                    display_value(value),
                ]);
            }
            println!("{rows}");
        }
        OutputFormat::Pretty => {
            println!("{name}:");
            for value in values {
                println!("  {} = {}", value.path, display_value(value));
            }
        }
    }
}

fn display_value(value: &DecodedValue) -> String {
    match &value.symbol {
        Some(symbol) => format!("{} ({symbol})", value.value),
        None => value.value.to_string(),
    }
}
