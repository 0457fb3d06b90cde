use std::fmt::{Display, Formatter};

/// Logical types that travel to the caller as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Text,
    Varchar,
    Bpchar,
    Numeric,
    Date,
    Time,
    Timestamp,
    TimestampTz,
}

/// The closed set of logical column types the encoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bytes,
    Text(TextKind),
}

impl DataType {
    pub const TEXT: DataType = DataType::Text(TextKind::Text);
    pub const VARCHAR: DataType = DataType::Text(TextKind::Varchar);
    pub const NUMERIC: DataType = DataType::Text(TextKind::Numeric);
    pub const DATE: DataType = DataType::Text(TextKind::Date);
    pub const TIMESTAMP: DataType = DataType::Text(TextKind::Timestamp);

    /// Character strings, decimals and temporal values, which are interchangeable on the wire.
    pub fn is_text_like(&self) -> bool {
        matches!(self, DataType::Text(_))
    }

    /// Character strings, which are quoted when rendered into a delimited line.
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            DataType::Text(TextKind::Text | TextKind::Varchar | TextKind::Bpchar)
        )
    }

    /// Whether a field of type `actual` may fill a column declared as `self`.
    pub fn accepts(&self, actual: &DataType) -> bool {
        self == actual || (self.is_text_like() && actual.is_text_like())
    }

    /// The type's object id in the calling database's catalog.
    pub fn oid(&self) -> u32 {
        match self {
            DataType::Bool => 16,
            DataType::Bytes => 17,
            DataType::Int64 => 20,
            DataType::Int16 => 21,
            DataType::Int32 => 23,
            DataType::Float32 => 700,
            DataType::Float64 => 701,
            DataType::Text(kind) => match kind {
                TextKind::Text => 25,
                TextKind::Bpchar => 1042,
                TextKind::Varchar => 1043,
                TextKind::Date => 1082,
                TextKind::Time => 1083,
                TextKind::Timestamp => 1114,
                TextKind::TimestampTz => 1184,
                TextKind::Numeric => 1700,
            },
        }
    }

    pub fn from_oid(oid: u32) -> Option<DataType> {
        Some(match oid {
            16 => DataType::Bool,
            17 => DataType::Bytes,
            20 => DataType::Int64,
            21 => DataType::Int16,
            23 => DataType::Int32,
            700 => DataType::Float32,
            701 => DataType::Float64,
            25 => DataType::Text(TextKind::Text),
            1042 => DataType::Text(TextKind::Bpchar),
            1043 => DataType::Text(TextKind::Varchar),
            1082 => DataType::Text(TextKind::Date),
            1083 => DataType::Text(TextKind::Time),
            1114 => DataType::Text(TextKind::Timestamp),
            1184 => DataType::Text(TextKind::TimestampTz),
            1700 => DataType::Text(TextKind::Numeric),
            _ => return None,
        })
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Bool => "BOOLEAN",
            DataType::Int16 => "SMALLINT",
            DataType::Int32 => "INTEGER",
            DataType::Int64 => "BIGINT",
            DataType::Float32 => "REAL",
            DataType::Float64 => "FLOAT8",
            DataType::Bytes => "BYTEA",
            DataType::Text(TextKind::Text) => "TEXT",
            DataType::Text(TextKind::Varchar) => "VARCHAR",
            DataType::Text(TextKind::Bpchar) => "BPCHAR",
            DataType::Text(TextKind::Numeric) => "NUMERIC",
            DataType::Text(TextKind::Date) => "DATE",
            DataType::Text(TextKind::Time) => "TIME",
            DataType::Text(TextKind::Timestamp) => "TIMESTAMP",
            DataType::Text(TextKind::TimestampTz) => "TIMESTAMP_WITH_TIME_ZONE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DataType::TEXT, DataType::VARCHAR, true)]
    #[case(DataType::NUMERIC, DataType::TIMESTAMP, true)]
    #[case(DataType::Int32, DataType::Int32, true)]
    #[case(DataType::Int32, DataType::Int64, false)]
    #[case(DataType::TEXT, DataType::Int32, false)]
    #[case(DataType::Bytes, DataType::TEXT, false)]
    fn compatibility(#[case] declared: DataType, #[case] actual: DataType, #[case] ok: bool) {
        assert_eq!(declared.accepts(&actual), ok);
    }

    #[test]
    fn oids_resolve_back() {
        for oid in [16, 17, 20, 21, 23, 25, 700, 701, 1042, 1043, 1082, 1083, 1114, 1184, 1700] {
            assert_eq!(DataType::from_oid(oid).map(|t| t.oid()), Some(oid));
        }
        assert_eq!(DataType::from_oid(2950), None);
    }
}
