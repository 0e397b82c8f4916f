pub mod domain;
pub mod duration;
pub mod ports;

pub use domain::{ChatId, CoreError, CoreResult, GlobalStore, Reminder, UserState};
pub use duration::parse_duration;
pub use ports::{
    ChatTransport, InboundMessage, InboundStream, PersistenceService, PortError, PortResult,
};
