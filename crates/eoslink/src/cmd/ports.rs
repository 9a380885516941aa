use serde::Serialize;

use crate::cmd::Context;
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, schema_id, OutputFormat};

#[derive(Serialize)]
struct PortEntry {
    service: &'static str,
    code: u32,
    port: u16,
    address: String,
}

#[derive(Serialize)]
struct PortsOutput {
    schema_id: String,
    ports: Vec<PortEntry>,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    let props = ctx
        .device()
        .endpoint()
        .properties()
        .map_err(|err| endpoint_error("discovery failed", err))?;

    let ports = props
        .ports
        .keys()
        .map(|&service| {
            let addr = props
                .service_addr(service)
                .map_err(|err| endpoint_error("address resolution failed", err))?;
            Ok(PortEntry {
                service: service.name(),
                code: service.code(),
                port: addr.port(),
                address: addr.to_string(),
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    let out = PortsOutput {
        schema_id: schema_id("service-ports"),
        ports,
    };
    print_ports(&out, ctx.format);
    Ok(SUCCESS)
}

fn print_ports(out: &PortsOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(
            ["SERVICE", "ADDRESS"],
            out.ports.iter().map(|p| (p.service, p.address.clone())),
        ),
        OutputFormat::Pretty => {
            if out.ports.is_empty() {
                println!("no services published");
            }
            for p in &out.ports {
                println!("{:<16} {:>5}  {}", p.service, p.port, p.address);
            }
        }
    }
}
