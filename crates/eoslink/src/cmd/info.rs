use serde::Serialize;

use crate::cmd::Context;
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, schema_id, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    schema_id: String,
    properties_path: String,
    interface: String,
    ifindex: u32,
    address: String,
    device_type: Option<String>,
    device_type_code: Option<u32>,
    services: usize,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    let device = ctx.device();
    let props = device
        .endpoint()
        .properties()
        .map_err(|err| endpoint_error("discovery failed", err))?;
    let device_type = device.device_type().ok();

    let out = InfoOutput {
        schema_id: schema_id("link-info"),
        properties_path: ctx.endpoint.properties_path.display().to_string(),
        interface: props.ifname.clone(),
        ifindex: props.ifindex,
        address: props.addr.to_string(),
        device_type: device_type.map(|t| t.to_string()),
        device_type_code: props.device_type,
        services: props.ports.len(),
    };

    print_info(&out, ctx.format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            ["FIELD", "VALUE"],
            [
                ("interface", format!("{} (index {})", out.interface, out.ifindex)),
                ("address", out.address.clone()),
                ("device type", device_type_text(out)),
                ("services", out.services.to_string()),
                ("properties", out.properties_path.clone()),
            ],
        ),
        OutputFormat::Pretty => {
            println!("Coprocessor Link:");
            println!("  Interface:   {} (index {})", out.interface, out.ifindex);
            println!("  Address:     {}", out.address);
            println!("  Device type: {}", device_type_text(out));
            println!("  Services:    {}", out.services);
            println!("  Properties:  {}", out.properties_path);
        }
    }
}

fn device_type_text(out: &InfoOutput) -> String {
    match (&out.device_type, out.device_type_code) {
        (Some(name), Some(code)) => format!("{name} ({code:#x})"),
        _ => "unpublished".to_string(),
    }
}
