use bytes::Bytes;

use crate::CsvOptions;

/// One serialized unit of the response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputUnit {
    /// A structured binary record encoded by the request's codec.
    Record(Bytes),
    /// A text line, terminated unless it is the trailing partial line of a stream.
    Line(Bytes),
    /// Raw bytes passed through as they were read.
    Buffer(Bytes),
}

impl OutputUnit {
    pub fn bytes(&self) -> &Bytes {
        match self {
            OutputUnit::Record(bytes) | OutputUnit::Line(bytes) | OutputUnit::Buffer(bytes) => {
                bytes
            }
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            OutputUnit::Record(bytes) | OutputUnit::Line(bytes) | OutputUnit::Buffer(bytes) => {
                bytes
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// How rows are shipped back to the caller. Fixed once per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Structured records with one slot per declared column.
    Binary,
    /// Delimited text lines.
    #[default]
    Text,
}

/// Row format of the caller's external table, which decides how raw bytes are escaped in text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableFormat {
    #[default]
    Csv,
    Text,
}

impl TableFormat {
    pub(crate) fn hex_prefix(&self) -> &'static str {
        match self {
            TableFormat::Csv => "\\x",
            TableFormat::Text => "\\\\x",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    pub output_format: OutputFormat,
    pub table_format: TableFormat,
    pub csv: CsvOptions,
    /// Raw buffers are split into lines so that rows can be sampled.
    pub sampling: bool,
}
