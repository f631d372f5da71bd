pub mod channel;
pub mod config;
pub mod error;
pub mod websocket;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::{DeliveryMode, Settings};

pub use channel::{Channel, Message};
pub use websocket::{RelayServer, Session, SessionRegistry, Supervisor};
