//! Durable, file-backed FIFO buffer used to absorb downstream slowness
//! between the router and a single output supervisor (§4.4).

mod checkpoint;
mod error;
mod segment;
mod spool;

pub use checkpoint::{format as format_checkpoint, parse as parse_checkpoint};
pub use error::{CheckpointError, SpoolError};
pub use spool::Spool;
