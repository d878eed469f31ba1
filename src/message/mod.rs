mod nom_parser;
mod parse;
pub mod tags;
mod types;

pub use self::nom_parser::RawMessage;
pub use self::parse::{parse_batch, parse_line};
pub use self::tags::Tags;
pub use self::types::{Message, MessageKind};
