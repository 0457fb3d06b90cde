//! Rows produced by the external readers arrive as lists of typed [`RecordField`]s. The
//! [`RecordEncoder`] turns each of them into [`OutputUnit`]s in the output mode fixed for the
//! request: structured binary records through an injected [`RecordCodec`], or delimited text
//! lines.

pub use codec::*;
pub use csv::*;
pub use data_type::*;
pub use encoder::*;
pub use field::*;
pub use output::*;

mod codec;
mod csv;
mod data_type;
mod encoder;
mod field;
mod output;
