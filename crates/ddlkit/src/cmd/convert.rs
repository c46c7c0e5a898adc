use ddlkit_model::{DdlVersion, DdlWriter, ReaderConfig, WriterConfig};
use serde::Serialize;
use tracing::info;

use crate::cmd::{load_definition, ConvertArgs};
use crate::exit::{io_error, model_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Serialize)]
struct ConvertOutput {
    schema_id: String,
    file: String,
    from: &'static str,
    to: &'static str,
    output: String,
    bytes: usize,
}

pub fn run(args: ConvertArgs, format: OutputFormat) -> CliResult<i32> {
    let version: DdlVersion = args
        .to
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("invalid --to: {err}")))?;

    // The written document must only contain what the source document has.
    let loaded = load_definition(
        &args.file,
        ReaderConfig {
            strict: args.strict,
            merge_predefined: false,
            ..ReaderConfig::default()
        },
    )?;

    let writer = DdlWriter::with_config(WriterConfig {
        version: Some(version),
        ..WriterConfig::default()
    });
    let text = writer
        .write_string(&loaded.definition)
        .map_err(|err| model_error("convert failed", err))?;

    let Some(path) = &args.output else {
        println!("{text}");
        return Ok(SUCCESS);
    };

    std::fs::write(path, &text)
        .map_err(|err| io_error(&format!("failed to write {}", path.display()), err))?;
    info!(
        from = loaded.version.as_str(),
        to = version.as_str(),
        path = %path.display(),
        "schema document converted"
    );

    let out = ConvertOutput {
        schema_id: schema_id("convert-result"),
        file: args.file.display().to_string(),
        from: loaded.version.as_str(),
        to: version.as_str(),
        output: path.display().to_string(),
        bytes: text.len(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "{} ({}) -> {} ({}, {} bytes)",
            out.file, out.from, out.output, out.to, out.bytes
        ),
    }
    Ok(SUCCESS)
}
