//! netanswer: a stub TCP server giving constant responses to constant requests.
//!
//! Intended for integration tests of code that talks to a remote peer over a
//! socket. The server reads requests delimited by a terminator (or by the end
//! of the connection), looks each one up in an [`AnswerTable`] and writes back
//! the canned response. Every request is recorded and can be inspected through
//! [`AnswerServer::requests`].

pub mod answers;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod server;

pub use answers::{AnswerTable, ResponseTable};
pub use config::{Config, Protocol, Trim};
pub use connection::{ConnectionHandler, ErrorLog, RequestLog, RequestSplitter};
pub use error::{
    ConfigError, ConnectionError, ConnectionFailure, DecodeError, ServerError, ServerResult,
};
pub use server::{AnswerServer, ServerState};
