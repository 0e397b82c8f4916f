pub mod json_file;
pub mod memory;
pub mod telegram;

pub use json_file::JsonFileAdapter;
pub use memory::{InMemoryPersistence, MemoryTransport};
pub use telegram::TelegramAdapter;
