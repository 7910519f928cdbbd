mod error;
mod model;
mod parser;
mod receiver;

pub use error::SyslogError;
pub use model::SyslogMessage;
pub use receiver::{
    spawn, SyslogReceiver, SyslogReceiverOptions, DEFAULT_MAX_BUFFERED_MESSAGES,
    DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_PORT,
};
