use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use ddlkit_codec::Representation;
use ddlkit_model::{DdlReader, Loaded, ReaderConfig};

use crate::exit::{model_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod convert;
pub mod decode;
pub mod info;
pub mod layout;
pub mod map;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a schema document and report its validation problems.
    Validate(ValidateArgs),
    /// Summarize the entities of a schema document.
    Info(InfoArgs),
    /// Print the serialized and deserialized layout of a struct.
    Layout(LayoutArgs),
    /// Decode a buffer of a struct given as hex.
    Decode(DecodeArgs),
    /// Rewrite a schema document in another language version.
    Convert(ConvertArgs),
    /// Map one target from source samples and print its buffer.
    Map(MapArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Validate(args) => validate::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Layout(args) => layout::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Convert(args) => convert::run(args, format),
        Command::Map(args) => map::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that reads a schema document.
#[derive(Args, Debug, Clone, Copy)]
pub struct LoadArgs {
    /// Fail on the first malformed fragment instead of skipping it.
    #[arg(long)]
    pub strict: bool,
    /// Do not add the predefined scalar types and SI units.
    #[arg(long)]
    pub no_predefined: bool,
}

impl LoadArgs {
    pub fn reader_config(self) -> ReaderConfig {
        ReaderConfig {
            strict: self.strict,
            merge_predefined: !self.no_predefined,
            ..ReaderConfig::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum RepresentationArg {
    #[default]
    Serialized,
    Deserialized,
}

impl From<RepresentationArg> for Representation {
    fn from(arg: RepresentationArg) -> Self {
        match arg {
            RepresentationArg::Serialized => Representation::Serialized,
            RepresentationArg::Deserialized => Representation::Deserialized,
        }
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema document.
    pub file: PathBuf,
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Schema document.
    pub file: PathBuf,
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Schema document.
    pub file: PathBuf,
    /// Struct to lay out.
    #[arg(value_name = "STRUCT")]
    pub struct_name: String,
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Schema document.
    pub file: PathBuf,
    /// Struct the buffer holds.
    #[arg(value_name = "STRUCT")]
    pub struct_name: String,
    /// Buffer bytes as hex, e.g. `0102ff` or `01 02 ff`.
    #[arg(long)]
    pub hex: String,
    /// Representation of the buffer.
    #[arg(long, value_enum, default_value = "serialized")]
    pub representation: RepresentationArg,
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Schema document.
    pub file: PathBuf,
    /// Target language version (1.0, 2.0, 3.0, 4.0 or 4.1).
    #[arg(long, value_name = "VERSION")]
    pub to: String,
    /// Write the document here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
    /// Fail on the first malformed fragment instead of skipping it.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Schema document describing every source and target type.
    #[arg(long, value_name = "FILE")]
    pub ddl: PathBuf,
    /// Mapping configuration document.
    #[arg(long, value_name = "FILE")]
    pub mapping: PathBuf,
    /// Target to map.
    #[arg(long)]
    pub target: String,
    /// Source sample as NAME=HEX; repeat for several samples.
    #[arg(long = "source", value_name = "NAME=HEX")]
    pub sources: Vec<String>,
    /// Representation of samples and the target buffer.
    #[arg(long, value_enum, default_value = "deserialized")]
    pub representation: RepresentationArg,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_definition(path: &Path, config: ReaderConfig) -> CliResult<Loaded> {
    DdlReader::with_config(config)
        .read_file(path)
        .map_err(|err| model_error(&format!("failed to read {}", path.display()), err))
}

/// Parse hex text, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits: {input}"),
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex input: {input}")))
        })
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_spacing_and_prefix() {
        assert_eq!(parse_hex("0102ff").unwrap(), vec![1, 2, 255]);
        assert_eq!(parse_hex("0x01 02\tFF").unwrap(), vec![1, 2, 255]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("123").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("é1").unwrap_err().code, USAGE);
    }

    #[test]
    fn to_hex_is_lowercase() {
        assert_eq!(to_hex(&[0, 171, 16]), "00ab10");
    }

    #[test]
    fn load_args_merge_predefined_by_default() {
        let config = LoadArgs {
            strict: false,
            no_predefined: false,
        }
        .reader_config();
        assert!(config.merge_predefined);
        assert!(!config.strict);
    }
}
