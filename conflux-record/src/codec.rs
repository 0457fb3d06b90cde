use bytes::Bytes;
use conflux_error::ConfluxResult;

use crate::{Column, RecordField};

/// The binary record layout shared with the calling database.
///
/// The byte layout is owned by the caller's side of the protocol, so the encoder only drives
/// records through this interface.
pub trait RecordCodec: Send + Sync {
    /// A record with one slot per column. It is reused for every row of the request.
    fn new_record(&self, columns: &[Column]) -> ConfluxResult<Box<dyn WireRecord>>;

    /// A record with a single text slot, flagged as carrying an error message.
    fn new_error_record(&self) -> ConfluxResult<Box<dyn WireRecord>>;
}

/// A mutable binary record with fixed slots.
pub trait WireRecord: Send {
    /// Stores `field` in slot `index`. The field's type has already been checked against the
    /// column.
    fn set_field(&mut self, index: usize, field: &RecordField) -> ConfluxResult<()>;

    /// Serializes the current slot values.
    fn encode(&self) -> ConfluxResult<Bytes>;
}
