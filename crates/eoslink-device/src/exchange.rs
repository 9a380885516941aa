use std::io::{Read, Write};

use eoslink_frame::{FrameConfig, FrameReader, FrameWriter};
use eoslink_message::Message;
use tracing::debug;

use crate::error::ExchangeError;

pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Message exchange over one byte stream.
///
/// The stream carries one outstanding request at a time; a
/// [`send_with_reply`](MessageStream::send_with_reply) owns the stream until
/// its reply has been read. A failed exchange leaves the stream at an unknown
/// position, so drop it and reconnect rather than retrying.
pub struct MessageStream<S> {
    stream: S,
    config: FrameConfig,
}

impl<S: Read + Write> MessageStream<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    pub fn with_config(stream: S, config: FrameConfig) -> Self {
        Self { stream, config }
    }

    /// Serialize, frame, and write one message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let payload = message.to_bytes()?;
        FrameWriter::with_config(&mut self.stream, self.config.clone()).send(&payload)?;
        debug!(command = %message.command(), bytes = payload.len(), "sent message");
        Ok(())
    }

    /// Read one frame and decode it as a message.
    pub fn receive(&mut self) -> Result<Message> {
        let payload =
            FrameReader::with_config(&mut self.stream, self.config.clone()).read_frame()?;
        let message = Message::from_bytes(&payload)?;
        debug!(command = %message.command(), bytes = payload.len(), "received message");
        Ok(message)
    }

    /// Send `request` and read exactly one reply.
    ///
    /// Fails with [`ExchangeError::CommandMismatch`] if the reply does not
    /// echo the request's command. The reply's `Success`/`Error` fields are
    /// left for the caller to inspect.
    pub fn send_with_reply(&mut self, request: &Message) -> Result<Message> {
        self.send(request)?;
        let reply = self.receive()?;
        if reply.command() != request.command() {
            return Err(ExchangeError::CommandMismatch {
                request: request.command(),
                reply: reply.command(),
            });
        }
        Ok(reply)
    }

    /// Answer one inbound query.
    ///
    /// Receives a query, builds a successful reply to it, lets `handler`
    /// fill in fields (or call [`Message::set_error`]), and sends the reply.
    /// Returns the query that was answered.
    pub fn respond<F>(&mut self, handler: F) -> Result<Message>
    where
        F: FnOnce(&Message, &mut Message),
    {
        let query = self.receive()?;
        let mut reply = Message::reply_to(&query);
        handler(&query, &mut reply);
        self.send(&reply)?;
        Ok(query)
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Send one message with default frame limits.
pub fn send<S: Read + Write>(stream: &mut S, message: &Message) -> Result<()> {
    MessageStream::new(stream).send(message)
}

/// Receive one message with default frame limits.
pub fn receive<S: Read + Write>(stream: &mut S) -> Result<Message> {
    MessageStream::new(stream).receive()
}

/// Send a request and receive its reply with default frame limits.
pub fn send_with_reply<S: Read + Write>(stream: &mut S, request: &Message) -> Result<Message> {
    MessageStream::new(stream).send_with_reply(request)
}

/// Answer one inbound query with default frame limits.
pub fn respond<S, F>(stream: &mut S, handler: F) -> Result<Message>
where
    S: Read + Write,
    F: FnOnce(&Message, &mut Message),
{
    MessageStream::new(stream).respond(handler)
}
