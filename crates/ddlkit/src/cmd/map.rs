use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ddlkit_codec::{CodecFactory, Representation, Status};
use ddlkit_mapping::{
    EngineConfig, MapConfiguration, MappingEngine, MappingEnvironment, PeriodicListener,
    TargetHandle,
};
use ddlkit_model::{DdlReader, ReaderConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cmd::decode::{decode_values, print_decoded, DecodedValue};
use crate::cmd::{parse_hex, to_hex, MapArgs};
use crate::exit::{
    codec_error, io_error, mapping_error, model_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{schema_id, OutputFormat};

/// Host for a single mapping pass. Every type resolves to the whole schema
/// document and periodic timers are accepted but never fire.
struct OneShotHost {
    ddl: String,
    started: Instant,
    transmissions: Mutex<Vec<Vec<u8>>>,
}

impl OneShotHost {
    fn new(ddl: String) -> Self {
        Self {
            ddl,
            started: Instant::now(),
            transmissions: Mutex::new(Vec::new()),
        }
    }

    fn transmission_count(&self) -> usize {
        self.transmissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl MappingEnvironment for OneShotHost {
    fn resolve_type(&self, _type_name: &str) -> Option<String> {
        Some(self.ddl.clone())
    }

    fn register_source(&self, source: &str, type_name: &str) -> Status {
        debug!(source, type_name, "source registered");
        Status::OK
    }

    fn unregister_source(&self, _source: &str) -> Status {
        Status::OK
    }

    fn send_target(&self, target: TargetHandle, data: &[u8]) -> Status {
        debug!(%target, bytes = data.len(), "target transmitted");
        self.transmissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(data.to_vec());
        Status::OK
    }

    fn target_mapped(&self, _target: &str, _type_name: &str, _handle: TargetHandle) -> Status {
        Status::OK
    }

    fn target_unmapped(&self, _target: &str, _handle: TargetHandle) -> Status {
        Status::OK
    }

    fn time(&self) -> Duration {
        self.started.elapsed()
    }

    fn register_periodic_timer(
        &self,
        period: Duration,
        _listener: Arc<dyn PeriodicListener>,
    ) -> Status {
        debug!(?period, "periodic trigger ignored in a single pass");
        Status::OK
    }

    fn unregister_periodic_timer(
        &self,
        _period: Duration,
        _listener: &Arc<dyn PeriodicListener>,
    ) -> Status {
        Status::OK
    }
}

#[derive(Serialize)]
struct MapOutput {
    schema_id: String,
    target: String,
    #[serde(rename = "type")]
    type_name: String,
    handle: TargetHandle,
    representation: Representation,
    transmissions: usize,
    data: String,
    values: Vec<DecodedValue>,
}

pub fn run(args: MapArgs, format: OutputFormat) -> CliResult<i32> {
    let samples = args
        .sources
        .iter()
        .map(String::as_str)
        .map(parse_sample)
        .collect::<CliResult<Vec<_>>>()?;

    let representation = Representation::from(args.representation);
    let config = EngineConfig {
        representation,
        ..EngineConfig::default()
    };
    let max_size = config.max_type_document_size;
    let ddl = std::fs::read_to_string(&args.ddl)
        .map_err(|err| io_error(&format!("failed to read {}", args.ddl.display()), err))?;
    let definition = DdlReader::with_config(ReaderConfig {
        merge_predefined: true,
        max_document_size: max_size,
        ..ReaderConfig::default()
    })
    .read_str(&ddl)
    .map_err(|err| model_error(&format!("failed to read {}", args.ddl.display()), err))?
    .definition;

    let mapping = MapConfiguration::read_file(&args.mapping, max_size)
        .map_err(|err| mapping_error(&format!("failed to read {}", args.mapping.display()), err))?;
    for problem in mapping.check_consistency(&definition) {
        warn!(context = %problem.context, "{}", problem.message);
    }
    let type_name = mapping
        .target(&args.target)
        .map(|target| target.type_name.clone())
        .ok_or_else(|| CliError::new(USAGE, format!("target '{}' is not configured", args.target)))?;

    let host = Arc::new(OneShotHost::new(ddl));
    let mut engine = MappingEngine::new(config, mapping, host.clone());
    let handle = engine
        .map(&args.target)
        .map_err(|err| mapping_error("map failed", err))?;
    engine
        .start()
        .map_err(|err| mapping_error("map failed", err))?;
    for (source, data) in &samples {
        engine
            .on_sample_received(source, data)
            .map_err(|err| mapping_error(&format!("sample of '{source}' rejected"), err))?;
    }
    let data = engine
        .get_current_data(handle)
        .map_err(|err| mapping_error("map failed", err))?;
    engine
        .stop()
        .map_err(|err| mapping_error("map failed", err))?;

    let factory = CodecFactory::try_new(&definition, &type_name)
        .map_err(|err| codec_error("decode failed", err))?;
    let decoder = factory
        .make_decoder(&data, representation)
        .map_err(|err| codec_error("decode failed", err))?;

    let out = MapOutput {
        schema_id: schema_id("mapped-target"),
        target: args.target,
        type_name,
        handle,
        representation,
        transmissions: host.transmission_count(),
        data: to_hex(&data),
        values: decode_values(&decoder)?,
    };
    let title = format!("{} {} ({} transmissions)", out.target, out.handle, out.transmissions);
    print_decoded(&title, &out.values, format, &out);
    Ok(SUCCESS)
}

fn parse_sample(spec: &str) -> CliResult<(String, Vec<u8>)> {
    let Some((name, hex)) = spec.split_once('=') else {
        return Err(CliError::new(
            USAGE,
            format!("--source expects NAME=HEX, got '{spec}'"),
        ));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::new(USAGE, format!("--source has no name: '{spec}'")));
    }
    Ok((name.to_string(), parse_hex(hex)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_samples() {
        let (name, data) = parse_sample("pos=0a000000").unwrap();
        assert_eq!(name, "pos");
        assert_eq!(data, vec![10, 0, 0, 0]);
        assert_eq!(parse_sample("pos").unwrap_err().code, USAGE);
        assert_eq!(parse_sample("=00").unwrap_err().code, USAGE);
    }

    #[test]
    fn host_records_transmissions() {
        let host = OneShotHost::new(String::new());
        assert!(host.send_target(TargetHandle(1), &[1, 2]).is_ok());
        assert_eq!(host.transmission_count(), 1);
        assert_eq!(host.resolve_type("Any"), Some(String::new()));
    }
}
