use std::fmt::{Display, Formatter};

use conflux_error::ConfluxResult;
use serde::Serialize;

/// Sizes at or above this many units are expressed in the next larger unit.
const SIZE_THRESHOLD: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeUnit {
    B,
    KB,
    MB,
    GB,
    TB,
}

impl SizeUnit {
    fn larger(self) -> Option<SizeUnit> {
        match self {
            SizeUnit::B => Some(SizeUnit::KB),
            SizeUnit::KB => Some(SizeUnit::MB),
            SizeUnit::MB => Some(SizeUnit::GB),
            SizeUnit::GB => Some(SizeUnit::TB),
            SizeUnit::TB => None,
        }
    }
}

impl Display for SizeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let unit = match self {
            SizeUnit::B => "B",
            SizeUnit::KB => "KB",
            SizeUnit::MB => "MB",
            SizeUnit::GB => "GB",
            SizeUnit::TB => "TB",
        };
        f.write_str(unit)
    }
}

/// A byte count scaled down to a readable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeWithUnit {
    size: u64,
    unit: SizeUnit,
}

impl SizeWithUnit {
    pub fn from_bytes(bytes: u64) -> Self {
        let mut size = bytes;
        let mut unit = SizeUnit::B;
        while size >= SIZE_THRESHOLD {
            match unit.larger() {
                Some(larger) => {
                    size /= 1024;
                    unit = larger;
                }
                None => break,
            }
        }
        Self { size, unit }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn unit(&self) -> SizeUnit {
        self.unit
    }
}

impl Display for SizeWithUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.size, self.unit)
    }
}

/// Summary statistics of the fragments of a data source, used by the caller to plan sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentStats {
    #[serde(rename = "fragmentsNumber")]
    fragment_count: u64,
    first_fragment_size: SizeWithUnit,
    total_size: SizeWithUnit,
}

#[derive(Serialize)]
struct StatsEnvelope<'a> {
    #[serde(rename = "PXFFragmentsStats")]
    stats: &'a FragmentStats,
}

impl FragmentStats {
    pub fn new(fragment_count: u64, first_fragment_bytes: u64, total_bytes: u64) -> Self {
        Self {
            fragment_count,
            first_fragment_size: SizeWithUnit::from_bytes(first_fragment_bytes),
            total_size: SizeWithUnit::from_bytes(total_bytes),
        }
    }

    pub fn fragment_count(&self) -> u64 {
        self.fragment_count
    }

    pub fn first_fragment_size(&self) -> SizeWithUnit {
        self.first_fragment_size
    }

    pub fn total_size(&self) -> SizeWithUnit {
        self.total_size
    }

    /// Serializes the statistics into the JSON document expected by the caller.
    pub fn to_json(&self) -> ConfluxResult<String> {
        Ok(serde_json::to_string(&StatsEnvelope { stats: self })?)
    }

    /// Human readable description of the statistics of `path`.
    pub fn describe(&self, path: &str) -> String {
        format!(
            "Statistics information for \"{}\"  Number of Fragments: {}, first Fragment size: {}, total size: {}",
            path, self.fragment_count, self.first_fragment_size, self.total_size
        )
    }
}

#[cfg(test)]
mod tests {
    use conflux_error::ConfluxUnwrap;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(100, 100, SizeUnit::B)]
    #[case(1_000_000, 1_000_000, SizeUnit::B)]
    #[case(1 << 32, 1 << 22, SizeUnit::KB)]
    #[case(1 << 40, 1 << 20, SizeUnit::MB)]
    #[case(6u64.pow(20), 6u64.pow(20) >> 30, SizeUnit::GB)]
    #[case(i64::MAX as u64, (i64::MAX as u64) >> 40, SizeUnit::TB)]
    #[case(u64::MAX, u64::MAX >> 40, SizeUnit::TB)]
    #[case(0, 0, SizeUnit::B)]
    fn scales_to_unit(#[case] bytes: u64, #[case] size: u64, #[case] unit: SizeUnit) {
        let scaled = SizeWithUnit::from_bytes(bytes);
        assert_eq!(scaled.size(), size);
        assert_eq!(scaled.unit(), unit);
    }

    #[test]
    fn json_envelope() {
        let stats = FragmentStats::new(25, 20_000_000, 1 << 40);
        assert_eq!(
            stats.to_json().conflux_unwrap(),
            r#"{"PXFFragmentsStats":{"fragmentsNumber":25,"firstFragmentSize":{"size":20000000,"unit":"B"},"totalSize":{"size":1048576,"unit":"MB"}}}"#
        );
    }

    #[test]
    fn describe_path() {
        let stats = FragmentStats::new(25, 2_000_000_000, i64::MAX as u64);
        assert_eq!(
            stats.describe("la la la"),
            "Statistics information for \"la la la\"  Number of Fragments: 25, first Fragment size: 1953125KB, total size: 8388607TB"
        );
    }
}
