//! Structured messages for the coprocessor link.
//!
//! A message is a string-keyed dictionary of property-list values, carried
//! as the payload of one frame in binary property-list form. Queries carry
//! `Command` and `Version`; replies echo `Command` and add `Success` and
//! `Error`.
//!
//! ```
//! use eoslink_message::{keys, Command, Message};
//!
//! let query = Message::new(Command::FETCH_BOOT_ARGS);
//! let mut reply = Message::reply_to(&query);
//! reply.set_string(keys::BOOT_ARGS, "debug=0x14e");
//!
//! let decoded = Message::from_bytes(&reply.to_bytes().unwrap()).unwrap();
//! assert_eq!(decoded.command(), query.command());
//! assert_eq!(decoded.get_str(keys::BOOT_ARGS), Some("debug=0x14e"));
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod gestalt;
pub mod message;
pub mod value;

pub use codec::{deserialize, serialize};
pub use command::{command_name, Command, MessageErrorCode};
pub use error::{MessageError, Result};
pub use message::{keys, Message, PROTOCOL_VERSION};
pub use value::{Dictionary, Value};
