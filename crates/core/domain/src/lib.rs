pub mod codec;
pub mod message;
pub mod types;

pub use codec::{mqtt_topic_suffix, parse, parse_mqtt, serialize, CodecError};
pub use message::{Direction, Message, MessageType};
pub use types::{InternalSubtype, PresentationCode, VariableKind};
