use ddlkit_model::{Problem, ValidationLevel};
use serde::Serialize;
use tracing::debug;

use crate::cmd::{load_definition, ValidateArgs};
use crate::exit::{CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_json, schema_id, table, OutputFormat};

#[derive(Serialize)]
struct ValidationOutput {
    schema_id: String,
    file: String,
    language_version: &'static str,
    level: ValidationLevel,
    valid: bool,
    problems: Vec<Problem>,
}

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_definition(&args.file, args.load.reader_config())?;

    let mut problems = loaded.problems.clone();
    problems.extend(loaded.definition.problems());
    debug!(
        file = %args.file.display(),
        level = %loaded.level,
        problems = problems.len(),
        "schema document validated"
    );

    let out = ValidationOutput {
        schema_id: schema_id("validation-report"),
        file: args.file.display().to_string(),
        language_version: loaded.version.as_str(),
        level: loaded.level,
        valid: loaded.level.is_usable(),
        problems,
    };
    print_report(&out, format);

    Ok(if out.valid { SUCCESS } else { DATA_INVALID })
}

fn print_report(out: &ValidationOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!(
                "{}: {} (language version {})",
                out.file, out.level, out.language_version
            );
            if !out.problems.is_empty() {
                let mut problems = table(vec!["CONTEXT", "PROBLEM"]);
                for problem in &out.problems {
                    problems.add_row(vec![problem.context.clone(), problem.message.clone()]);
                }
                println!("{problems}");
            }
        }
        OutputFormat::Pretty => {
            println!("{}: {}", out.file, out.level);
            for problem in &out.problems {
                println!("  {problem}");
            }
        }
    }
}
