pub mod handler;
pub mod log;
pub mod splitter;

pub use handler::ConnectionHandler;
pub use log::{ErrorLog, RequestLog};
pub use splitter::RequestSplitter;
