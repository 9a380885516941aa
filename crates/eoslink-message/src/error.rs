/// Errors that can occur while encoding, decoding, or inspecting messages.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload is not a well-formed property list of the expected shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A required field is absent.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A field holds a value of the wrong type.
    #[error("field '{field}' has type {found}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, MessageError>;
