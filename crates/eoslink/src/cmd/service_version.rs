use serde::Serialize;

use eoslink_message::PROTOCOL_VERSION;

use crate::cmd::Context;
use crate::exit::{eos_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Serialize)]
struct ServiceVersionOutput {
    schema_id: String,
    protocol_version: u32,
    supported: bool,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    ctx.device()
        .check_service_version()
        .map_err(|err| eos_error("service version check failed", err))?;

    match ctx.format {
        OutputFormat::Json => print_json(&ServiceVersionOutput {
            schema_id: schema_id("service-version"),
            protocol_version: PROTOCOL_VERSION,
            supported: true,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("protocol version {PROTOCOL_VERSION} supported");
        }
    }
    Ok(SUCCESS)
}
