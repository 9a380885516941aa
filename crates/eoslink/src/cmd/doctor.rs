use serde::Serialize;

use eoslink_device::Device;
use eoslink_endpoint::Service;

use crate::cmd::Context;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, schema_id, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: String,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    let checks = run_checks(&ctx.device());

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        schema_id: schema_id("doctor-report"),
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };
    print_doctor(&output, ctx.format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

/// Each check runs only if the link it depends on was found.
fn run_checks(device: &Device) -> Vec<CheckResult> {
    let props = match device.endpoint().properties() {
        Ok(props) => props,
        Err(err) => {
            return vec![
                CheckResult::new("discovery", CheckStatus::Fail, err.to_string()),
                CheckResult::new("device_query_port", CheckStatus::Skip, "no link"),
                CheckResult::new("service_version", CheckStatus::Skip, "no link"),
            ];
        }
    };

    let mut checks = vec![CheckResult::new(
        "discovery",
        CheckStatus::Pass,
        format!("{} on {} (index {})", props.addr, props.ifname, props.ifindex),
    )];

    checks.push(match device.device_type() {
        Ok(device_type) => {
            CheckResult::new("device_type", CheckStatus::Pass, device_type.to_string())
        }
        Err(_) => CheckResult::new(
            "device_type",
            CheckStatus::Warn,
            "not published, using default frame limits",
        ),
    });

    match props.port(Service::DeviceQuery) {
        Ok(port) => {
            checks.push(CheckResult::new(
                "device_query_port",
                CheckStatus::Pass,
                port.to_string(),
            ));
            checks.push(match device.check_service_version() {
                Ok(()) => CheckResult::new(
                    "service_version",
                    CheckStatus::Pass,
                    format!("protocol {} accepted", eoslink_message::PROTOCOL_VERSION),
                ),
                Err(err) => CheckResult::new("service_version", CheckStatus::Fail, err.to_string()),
            });
        }
        Err(err) => {
            checks.push(CheckResult::new(
                "device_query_port",
                CheckStatus::Fail,
                err.to_string(),
            ));
            checks.push(CheckResult::new(
                "service_version",
                CheckStatus::Skip,
                "no device-query port",
            ));
        }
    }

    checks
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("eoslink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Skip => "SKIP",
    }
}
