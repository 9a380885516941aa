use serde::Serialize;
use tracing::warn;

use eoslink_message::{gestalt, Dictionary};

use crate::cmd::{Context, GestaltArgs};
use crate::exit::{eos_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, schema_id, value_preview, value_to_json, OutputFormat};

#[derive(Serialize)]
struct GestaltOutput {
    schema_id: String,
    answers: serde_json::Map<String, serde_json::Value>,
    unanswered: Vec<String>,
}

#[derive(Serialize)]
struct SupportedKeysOutput {
    schema_id: String,
    keys: Vec<String>,
}

pub fn run(args: GestaltArgs, ctx: &Context) -> CliResult<i32> {
    for key in args.keys.iter().filter(|key| !gestalt::is_known(key)) {
        warn!(key = %key, "requesting unrecognized gestalt key");
    }

    let answers = ctx
        .device()
        .fetch_gestalt_keys(&args.keys)
        .map_err(|err| eos_error("gestalt query failed", err))?;

    let unanswered = args
        .keys
        .iter()
        .filter(|key| !answers.contains_key(key.as_str()))
        .cloned()
        .collect();
    print_answers(&answers, unanswered, ctx.format);
    Ok(SUCCESS)
}

pub fn run_supported(ctx: &Context) -> CliResult<i32> {
    let keys = ctx
        .device()
        .fetch_supported_gestalt_keys()
        .map_err(|err| eos_error("gestalt key listing failed", err))?;

    match ctx.format {
        OutputFormat::Json => print_json(&SupportedKeysOutput {
            schema_id: schema_id("gestalt-keys"),
            keys,
        }),
        OutputFormat::Table => print_table(
            ["KEY", "KNOWN"],
            keys.iter()
                .map(|key| (key.as_str(), gestalt::is_known(key).to_string())),
        ),
        OutputFormat::Pretty => {
            for key in &keys {
                println!("{key}");
            }
        }
    }
    Ok(SUCCESS)
}

fn print_answers(answers: &Dictionary, unanswered: Vec<String>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&GestaltOutput {
            schema_id: schema_id("gestalt-answers"),
            answers: answers
                .iter()
                .map(|(key, value)| (key.clone(), value_to_json(value)))
                .collect(),
            unanswered,
        }),
        OutputFormat::Table => print_table(
            ["KEY", "VALUE"],
            answers
                .iter()
                .map(|(key, value)| (key.as_str(), value_preview(value)))
                .chain(unanswered.iter().map(|key| (key.as_str(), "-".to_string()))),
        ),
        OutputFormat::Pretty => {
            for (key, value) in answers {
                println!("{key}: {}", value_preview(value));
            }
            for key in &unanswered {
                println!("{key}: (no answer)");
            }
        }
    }
}
