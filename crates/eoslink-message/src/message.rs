use tracing::warn;

use crate::codec;
use crate::command::{Command, MessageErrorCode};
use crate::error::{MessageError, Result};
use crate::value::{Dictionary, Value};

/// Protocol version stamped on every query.
pub const PROTOCOL_VERSION: u32 = 1000;

/// Field names used by the envelope and the built-in commands.
pub mod keys {
    pub const COMMAND: &str = "Command";
    pub const VERSION: &str = "Version";
    pub const SUCCESS: &str = "Success";
    pub const ERROR: &str = "Error";
    pub const GESTALT_KEYS: &str = "GestaltKeys";
    pub const GESTALT_KEYS_WITH_ANSWERS: &str = "GestaltKeysWithAnswers";
    pub const BOOT_ARGS: &str = "BootArgs";
    pub const CRASH_CONTENT: &str = "CrashContent";
    pub const CRASH_PROC_NAME: &str = "CrashProcName";
}

/// A query or reply exchanged with the coprocessor.
///
/// A message always carries a `Command`. Queries built with [`Message::new`]
/// also carry `Version`; replies built with [`Message::reply_to`] echo the
/// query's command and carry `Success` and `Error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    command: Command,
    fields: Dictionary,
}

impl Message {
    /// Build a query for `command`.
    pub fn new(command: Command) -> Self {
        let mut fields = Dictionary::new();
        fields.insert(keys::COMMAND.to_string(), Value::from(command.code()));
        fields.insert(keys::VERSION.to_string(), Value::from(PROTOCOL_VERSION));
        Self { command, fields }
    }

    /// Build a successful reply to `request`.
    pub fn reply_to(request: &Message) -> Self {
        let command = request.command();
        let mut fields = Dictionary::new();
        fields.insert(keys::COMMAND.to_string(), Value::from(command.code()));
        fields.insert(keys::SUCCESS.to_string(), Value::Boolean(true));
        fields.insert(
            keys::ERROR.to_string(),
            Value::from(MessageErrorCode::None.code()),
        );
        Self { command, fields }
    }

    /// Wrap a decoded dictionary, which must carry an integer `Command`.
    pub fn from_fields(fields: Dictionary) -> Result<Self> {
        let value = fields
            .get(keys::COMMAND)
            .ok_or_else(|| MessageError::MissingField(keys::COMMAND.to_string()))?;
        let code = value.as_u32().ok_or_else(|| MessageError::WrongType {
            field: keys::COMMAND.to_string(),
            expected: "u32 integer",
            found: value.type_name(),
        })?;
        Ok(Self {
            command: Command(code),
            fields,
        })
    }

    /// Decode a message from a frame payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_fields(codec::deserialize(bytes)?)
    }

    /// Encode the message as a frame payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::serialize(&self.fields)
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn version(&self) -> Option<u32> {
        self.get_u32(keys::VERSION)
    }

    /// True if the message carries a reply envelope.
    pub fn is_reply(&self) -> bool {
        self.fields.contains_key(keys::SUCCESS)
    }

    pub fn success(&self) -> Option<bool> {
        self.get_bool(keys::SUCCESS)
    }

    pub fn error_code(&self) -> Option<MessageErrorCode> {
        self.get_u32(keys::ERROR).map(MessageErrorCode::from_code)
    }

    /// Record a message-level error; `Success` follows the code.
    pub fn set_error(&mut self, code: MessageErrorCode) {
        self.fields
            .insert(keys::SUCCESS.to_string(), Value::Boolean(code.is_none()));
        self.fields
            .insert(keys::ERROR.to_string(), Value::from(code.code()));
    }

    /// Set a field, returning the previous value.
    ///
    /// `Command` only accepts values that fit in a `u32`; anything else is
    /// ignored so the message keeps a valid command.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if key == keys::COMMAND {
            match value.as_u32() {
                Some(code) => self.command = Command(code),
                None => {
                    warn!(found = value.type_name(), "ignoring non-integer Command field");
                    return None;
                }
            }
        }
        self.fields.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Remove a field. The `Command` field cannot be removed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == keys::COMMAND {
            return None;
        }
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set_u32(&mut self, key: impl Into<String>, value: u32) {
        self.set(key, value);
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(Value::as_u32)
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Value::String(value.into()));
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, value);
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Fetch a field that must be present.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| MessageError::MissingField(key.to_string()))
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| wrong_type(key, "string", value))
    }

    pub fn require_array(&self, key: &str) -> Result<&[Value]> {
        let value = self.require(key)?;
        value.as_array().ok_or_else(|| wrong_type(key, "array", value))
    }

    pub fn require_dictionary(&self, key: &str) -> Result<&Dictionary> {
        let value = self.require(key)?;
        value
            .as_dictionary()
            .ok_or_else(|| wrong_type(key, "dictionary", value))
    }

    /// Borrow every field, envelope included.
    pub fn fields(&self) -> &Dictionary {
        &self.fields
    }

    pub fn into_fields(self) -> Dictionary {
        self.fields
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &Value) -> MessageError {
    MessageError::WrongType {
        field: key.to_string(),
        expected,
        found: value.type_name(),
    }
}
