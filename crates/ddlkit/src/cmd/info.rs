use std::collections::BTreeMap;

use ddlkit_layout::layout_of;
use ddlkit_model::{DataDefinition, EntityKind, EntityRef, ValidationLevel};
use serde::Serialize;

use crate::cmd::{load_definition, InfoArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{optional, print_json, schema_id, table, OutputFormat};

#[derive(Serialize)]
struct StructSummary {
    name: String,
    level: ValidationLevel,
    serialized_size: Option<usize>,
    deserialized_size: Option<usize>,
    dynamic: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    schema_id: String,
    file: String,
    language_version: &'static str,
    author: String,
    description: String,
    level: ValidationLevel,
    counts: BTreeMap<&'static str, usize>,
    structs: Vec<StructSummary>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_definition(&args.file, args.load.reader_config())?;
    let definition = &loaded.definition;
    let header = definition.header();

    let out = InfoOutput {
        schema_id: schema_id("definition-info"),
        file: args.file.display().to_string(),
        language_version: loaded.version.as_str(),
        author: header.author.clone(),
        description: header.description.clone(),
        level: loaded.level,
        counts: counts(definition),
        structs: summarize_structs(definition),
    };

    print_info(&out, format);
    Ok(SUCCESS)
}

fn counts(definition: &DataDefinition) -> BTreeMap<&'static str, usize> {
    BTreeMap::from([
        ("base_units", definition.base_units().len()),
        ("prefixes", definition.prefixes().len()),
        ("units", definition.units().len()),
        ("data_types", definition.data_types().len()),
        ("enums", definition.enums().len()),
        ("structs", definition.structs().len()),
        ("stream_meta_types", definition.stream_meta_types().len()),
        ("streams", definition.streams().len()),
    ])
}

fn summarize_structs(definition: &DataDefinition) -> Vec<StructSummary> {
    definition
        .structs()
        .names()
        .map(|name| {
            let layout = layout_of(definition, name);
            StructSummary {
                name: name.to_string(),
                level: definition.level_of(&EntityRef::new(EntityKind::StructType, name)),
                serialized_size: layout.as_ref().and_then(|l| l.serialized_size()),
                deserialized_size: layout.as_ref().and_then(|l| l.deserialized_size()),
                dynamic: layout.as_ref().is_some_and(|l| l.has_dynamic_arrays()),
            }
        })
        .collect()
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!("Definition: {} (language version {})", out.file, out.language_version);
            println!("Level:      {}", out.level);
            let mut counts = table(vec!["KIND", "COUNT"]);
            for (kind, count) in &out.counts {
                counts.add_row(vec![kind.to_string(), count.to_string()]);
            }
            println!("{counts}");

            let mut structs = table(vec!["STRUCT", "LEVEL", "SERIALIZED", "DESERIALIZED"]);
            for summary in &out.structs {
                structs.add_row(vec![
                    summary.name.clone(),
                    summary.level.to_string(),
                    optional(summary.serialized_size),
                    optional(summary.deserialized_size),
                ]);
            }
            println!("{structs}");
        }
        OutputFormat::Pretty => {
            println!("Definition Info:");
            println!("  File:             {}", out.file);
            println!("  Language version: {}", out.language_version);
            if !out.author.is_empty() {
                println!("  Author:           {}", out.author);
            }
            println!("  Level:            {}", out.level);
            let counts = out
                .counts
                .iter()
                .map(|(kind, count)| format!("{kind}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  Entities:         {counts}");
            for summary in &out.structs {
                println!(
                    "  struct {}: {} bytes serialized, {} bytes deserialized",
                    summary.name,
                    optional(summary.serialized_size),
                    optional(summary.deserialized_size)
                );
            }
        }
    }
}
