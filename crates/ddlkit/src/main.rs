mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ddlkit", version, about = "Data definition toolkit CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "DDLKIT_LOG_LEVEL",
        default_value = "warn",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_subcommand() {
        let cli = Cli::try_parse_from([
            "ddlkit",
            "decode",
            "types.ddl",
            "Pos",
            "--hex",
            "0a000000",
            "--representation",
            "deserialized",
        ])
        .expect("decode args should parse");

        assert!(matches!(cli.command, Command::Decode(_)));
    }

    #[test]
    fn parses_repeated_map_sources() {
        let cli = Cli::try_parse_from([
            "ddlkit",
            "--format",
            "json",
            "map",
            "--ddl",
            "types.ddl",
            "--mapping",
            "map.xml",
            "--target",
            "out",
            "--source",
            "a=00",
            "--source",
            "b=01",
        ])
        .expect("map args should parse");

        match cli.command {
            Command::Map(args) => assert_eq!(args.sources, vec!["a=00", "b=01"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn layout_requires_a_struct_name() {
        let err = Cli::try_parse_from(["ddlkit", "layout", "types.ddl"])
            .expect_err("missing struct should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_representation() {
        let err = Cli::try_parse_from([
            "ddlkit", "decode", "types.ddl", "Pos", "--hex", "00", "--representation", "wire",
        ])
        .expect_err("unknown representation should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
