use serde::Serialize;

use crate::cmd::Context;
use crate::exit::{eos_error, CliResult, SUCCESS};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Serialize)]
struct BootArgsOutput {
    schema_id: String,
    boot_args: String,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    let boot_args = ctx
        .device()
        .fetch_boot_args()
        .map_err(|err| eos_error("boot-args query failed", err))?;

    match ctx.format {
        OutputFormat::Json => print_json(&BootArgsOutput {
            schema_id: schema_id("boot-args"),
            boot_args,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{boot_args}"),
    }
    Ok(SUCCESS)
}
