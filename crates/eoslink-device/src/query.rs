//! Device-query service operations.
//!
//! Each operation builds one query, exchanges it with
//! [`MessageStream::send_with_reply`], and picks its answer field out of the
//! reply. They work over any stream; [`Device`](crate::Device) supplies a
//! connection to the device-query service.

use std::io::{Read, Write};

use eoslink_message::{keys, Command, Dictionary, Message, MessageError, MessageErrorCode, Value};

use crate::error::{EosError, ExchangeError, Result};
use crate::exchange::MessageStream;

/// Fetch answers for `requested` keys from the coprocessor's gestalt.
///
/// Keys the coprocessor cannot answer are absent from the returned map.
pub fn fetch_gestalt_keys<S, K>(
    stream: &mut MessageStream<S>,
    requested: &[K],
) -> Result<Dictionary>
where
    S: Read + Write,
    K: AsRef<str>,
{
    if requested.is_empty() {
        return Err(EosError::BadArgument("no gestalt keys requested".to_string()));
    }

    let mut request = Message::new(Command::FETCH_GESTALT_KEYS);
    request.set(
        keys::GESTALT_KEYS,
        requested.iter().map(|key| key.as_ref()).collect::<Value>(),
    );
    let reply = exchange(stream, &request)?;
    let answers = reply
        .require_dictionary(keys::GESTALT_KEYS_WITH_ANSWERS)
        .map_err(ExchangeError::from)?;
    Ok(answers.clone())
}

/// List every gestalt key the coprocessor can answer.
pub fn fetch_supported_gestalt_keys<S: Read + Write>(
    stream: &mut MessageStream<S>,
) -> Result<Vec<String>> {
    let reply = exchange(stream, &Message::new(Command::FETCH_SUPPORTED_GESTALT_KEYS_LIST))?;
    let listed = reply
        .require_array(keys::GESTALT_KEYS)
        .map_err(ExchangeError::from)?;

    listed
        .iter()
        .map(|value| {
            value.as_str().map(str::to_string).ok_or_else(|| {
                EosError::from(ExchangeError::from(MessageError::WrongType {
                    field: keys::GESTALT_KEYS.to_string(),
                    expected: "array of strings",
                    found: value.type_name(),
                }))
            })
        })
        .collect()
}

/// Kernel boot arguments the coprocessor booted with.
pub fn fetch_boot_args<S: Read + Write>(stream: &mut MessageStream<S>) -> Result<String> {
    let reply = exchange(stream, &Message::new(Command::FETCH_BOOT_ARGS))?;
    let boot_args = reply
        .require_str(keys::BOOT_ARGS)
        .map_err(ExchangeError::from)?;
    Ok(boot_args.to_string())
}

/// Check that the coprocessor accepts this protocol version.
///
/// Any unsuccessful reply means the version is unsupported.
pub fn check_service_version<S: Read + Write>(stream: &mut MessageStream<S>) -> Result<()> {
    let reply = stream.send_with_reply(&Message::new(Command::GET_SERVICE_VERSION))?;
    if reply.success() == Some(true) {
        Ok(())
    } else {
        Err(EosError::DeviceNotSupported(format!(
            "service version {} rejected ({})",
            eoslink_message::PROTOCOL_VERSION,
            reply.error_code().map_or_else(|| "no error code".to_string(), |c| c.to_string())
        )))
    }
}

/// Exchange `request` and require a successful reply.
fn exchange<S: Read + Write>(stream: &mut MessageStream<S>, request: &Message) -> Result<Message> {
    let reply = stream.send_with_reply(request)?;
    if reply.success() == Some(false) {
        return Err(ExchangeError::Rejected {
            command: reply.command(),
            code: reply.error_code().unwrap_or(MessageErrorCode::Unknown),
        }
        .into());
    }
    Ok(reply)
}
