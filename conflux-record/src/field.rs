use bytes::Bytes;
use jiff::Timestamp;
use jiff::civil::{Date, DateTime, Time};

use crate::{DataType, TextKind};

/// A single non-null value produced by a reader.
///
/// Nested values (arrays, maps, structs) arrive already flattened to text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Bytes),
    Text(String),
    Date(Date),
    Time(Time),
    Timestamp(DateTime),
    TimestampTz(Timestamp),
}

/// One typed value of a row, as handed over by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub data_type: DataType,
    pub value: Option<FieldValue>,
}

impl RecordField {
    pub fn new(data_type: DataType, value: FieldValue) -> Self {
        Self {
            data_type,
            value: Some(value),
        }
    }

    pub fn null(data_type: DataType) -> Self {
        Self {
            data_type,
            value: None,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(DataType::Bool, FieldValue::Bool(value))
    }

    pub fn int16(value: i16) -> Self {
        Self::new(DataType::Int16, FieldValue::Int16(value))
    }

    pub fn int32(value: i32) -> Self {
        Self::new(DataType::Int32, FieldValue::Int32(value))
    }

    pub fn int64(value: i64) -> Self {
        Self::new(DataType::Int64, FieldValue::Int64(value))
    }

    pub fn float32(value: f32) -> Self {
        Self::new(DataType::Float32, FieldValue::Float32(value))
    }

    pub fn float64(value: f64) -> Self {
        Self::new(DataType::Float64, FieldValue::Float64(value))
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::new(DataType::Bytes, FieldValue::Bytes(value.into()))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(DataType::TEXT, FieldValue::Text(value.into()))
    }

    /// A decimal, carried as its exact textual representation.
    pub fn numeric(value: impl Into<String>) -> Self {
        Self::new(DataType::NUMERIC, FieldValue::Text(value.into()))
    }

    pub fn date(value: Date) -> Self {
        Self::new(DataType::DATE, FieldValue::Date(value))
    }

    pub fn time(value: Time) -> Self {
        Self::new(DataType::Text(TextKind::Time), FieldValue::Time(value))
    }

    pub fn timestamp(value: DateTime) -> Self {
        Self::new(DataType::TIMESTAMP, FieldValue::Timestamp(value))
    }

    pub fn timestamp_tz(value: Timestamp) -> Self {
        Self::new(
            DataType::Text(TextKind::TimestampTz),
            FieldValue::TimestampTz(value),
        )
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// A column of the schema declared by the caller for the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}
