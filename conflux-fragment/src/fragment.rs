use std::fmt::{Display, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use rustc_hash::FxHashMap;

/// One schedulable unit of external data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    source_name: Arc<str>,
    locations: Vec<String>,
    index: usize,
    metadata: Option<Bytes>,
    user_data: Option<Bytes>,
    profile: Option<String>,
}

impl Fragment {
    /// A fragment of `source_name` with no known locations.
    pub fn new(source_name: impl Into<Arc<str>>) -> Self {
        Self {
            source_name: source_name.into(),
            locations: Vec::new(),
            index: 0,
            metadata: None,
            user_data: None,
            profile: None,
        }
    }

    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<Bytes>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// File path and name, table name, etc.
    pub fn source_name(&self) -> &Arc<str> {
        &self.source_name
    }

    /// Hosts holding a replica of the fragment.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Position of the fragment among the fragments sharing its source name.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Opaque, source-specific description of the fragment (start and length, region, ...).
    pub fn metadata(&self) -> Option<&Bytes> {
        self.metadata.as_ref()
    }

    pub fn user_data(&self) -> Option<&Bytes> {
        self.user_data.as_ref()
    }

    /// Reader profile recommended for this fragment, if it differs from the request's.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

impl Display for Fragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.source_name, self.index)
    }
}

/// Reassigns fragment indices so that they count up from zero for every distinct source name,
/// following the order of the list.
pub fn renumber_fragments(fragments: &mut [Fragment]) {
    let mut next_index: FxHashMap<Arc<str>, usize> = FxHashMap::default();
    for fragment in fragments.iter_mut() {
        let index = next_index.entry(fragment.source_name.clone()).or_default();
        fragment.index = *index;
        *index += 1;
    }
}
