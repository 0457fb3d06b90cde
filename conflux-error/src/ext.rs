use crate::{ConfluxError, ConfluxResult, SharedConfluxResult};

/// Extension trait turning a result shared between several waiters back into an owned one.
pub trait SharedResultExt<T> {
    /// Converts the shared error into an owned [`ConfluxError`], unwrapping it when this is the
    /// last holder.
    fn unshare(self) -> ConfluxResult<T>;
}

impl<T> SharedResultExt<T> for SharedConfluxResult<T> {
    fn unshare(self) -> ConfluxResult<T> {
        self.map_err(ConfluxError::from_shared)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::conflux_err;

    #[test]
    fn unshare_last_holder() {
        let result: SharedConfluxResult<()> = Err(Arc::new(conflux_err!(Teardown: "gone")));
        assert!(matches!(result.unshare(), Err(ConfluxError::Teardown(..))));
    }
}
