//! Message, envelope and pool types shared by every conduit component.

mod envelope;
mod error;
mod message;
mod pool;

pub use envelope::MessageEnvelope;
pub use error::MessageError;
pub use message::{Field, FieldValue, Message, NumericHeader, StringHeader};
pub use pool::MessagePool;
