use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Identifies one scan of one query: every segment of the same query computes the same key.
///
/// The key is the colon-joined tuple `server:transaction:schema:table:dataSource:filter`, with an
/// empty trailing component when the scan carries no filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentCacheKey(Arc<str>);

impl FragmentCacheKey {
    pub fn new(
        server_name: &str,
        transaction_id: &str,
        schema_name: &str,
        table_name: &str,
        data_source: &str,
        filter: Option<&str>,
    ) -> Self {
        let key = [
            server_name,
            transaction_id,
            schema_name,
            table_name,
            data_source,
            filter.unwrap_or_default(),
        ]
        .join(":");
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FragmentCacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
