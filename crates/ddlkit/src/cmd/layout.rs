use ddlkit_layout::{try_layout_of, ArraySpec, ElementKind, ElementLayout, StructLayout};
use serde::Serialize;

use crate::cmd::{load_definition, LayoutArgs};
use crate::exit::{layout_error, CliResult, SUCCESS};
use crate::output::{optional, print_json, schema_id, table, OutputFormat};

#[derive(Serialize)]
struct ElementRow {
    name: String,
    kind: String,
    array: String,
    byte_order: &'static str,
    serialized_bit_offset: Option<u64>,
    serialized_bits: Option<u64>,
    deserialized_offset: Option<usize>,
    deserialized_size: Option<usize>,
    alignment: usize,
}

#[derive(Serialize)]
struct DynamicRow {
    path: String,
    size_path: String,
}

#[derive(Serialize)]
struct LayoutOutput {
    schema_id: String,
    name: String,
    serialized_bits: Option<u64>,
    serialized_size: Option<usize>,
    deserialized_size: Option<usize>,
    alignment: usize,
    elements: Vec<ElementRow>,
    dynamic_arrays: Vec<DynamicRow>,
}

pub fn run(args: LayoutArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_definition(&args.file, args.load.reader_config())?;
    let layout = try_layout_of(&loaded.definition, &args.struct_name)
        .map_err(|err| layout_error("layout failed", err))?;

    let out = describe(&layout);
    print_layout(&out, format);
    Ok(SUCCESS)
}

fn describe(layout: &StructLayout) -> LayoutOutput {
    LayoutOutput {
        schema_id: schema_id("struct-layout"),
        name: layout.name.clone(),
        serialized_bits: layout.serialized_bits(),
        serialized_size: layout.serialized_size(),
        deserialized_size: layout.deserialized_size(),
        alignment: layout.alignment,
        elements: layout.elements.iter().map(element_row).collect(),
        dynamic_arrays: layout
            .dynamic_arrays()
            .into_iter()
            .map(|array| DynamicRow {
                path: array.path,
                size_path: array.size_path,
            })
            .collect(),
    }
}

fn element_row(element: &ElementLayout) -> ElementRow {
    let kind = match &element.kind {
        ElementKind::Scalar(scalar) => scalar.as_str().to_string(),
        ElementKind::Enum { name, scalar } => format!("enum {name} ({})", scalar.as_str()),
        ElementKind::Struct(nested) => format!("struct {}", nested.name),
    };
    let array = match &element.array {
        ArraySpec::Fixed(count) => count.to_string(),
        ArraySpec::Dynamic(size) => format!("[{size}]"),
    };

    ElementRow {
        name: element.name.clone(),
        kind,
        array,
        byte_order: element.byte_order.as_str(),
        serialized_bit_offset: element.serialized_bit_offset,
        serialized_bits: element.serialized_bits(),
        deserialized_offset: element.deserialized_offset,
        deserialized_size: element.deserialized_size(),
        alignment: element.alignment,
    }
}

fn print_layout(out: &LayoutOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!(
                "struct {}: serialized {} bytes, deserialized {} bytes, alignment {}",
                out.name,
                optional(out.serialized_size),
                optional(out.deserialized_size),
                out.alignment
            );
            let mut elements = table(vec![
                "ELEMENT", "TYPE", "COUNT", "ORDER", "BIT OFFSET", "BITS", "OFFSET", "SIZE",
            ]);
            for row in &out.elements {
                elements.add_row(vec![
                    row.name.clone(),
                    row.kind.clone(),
                    row.array.clone(),
                    row.byte_order.to_string(),
                    optional(row.serialized_bit_offset),
                    optional(row.serialized_bits),
                    optional(row.deserialized_offset),
                    optional(row.deserialized_size),
                ]);
            }
            println!("{elements}");
        }
        OutputFormat::Pretty => {
            println!("struct {} (alignment {})", out.name, out.alignment);
            for row in &out.elements {
                println!(
                    "  {:<16} {:<24} x{:<6} bits @{} +{}  bytes @{} +{}",
                    row.name,
                    row.kind,
                    row.array,
                    optional(row.serialized_bit_offset),
                    optional(row.serialized_bits),
                    optional(row.deserialized_offset),
                    optional(row.deserialized_size)
                );
            }
            for array in &out.dynamic_arrays {
                println!("  dynamic: {} sized by {}", array.path, array.size_path);
            }
        }
    }
}
