use std::sync::Arc;

use conflux_error::ConfluxResult;
use conflux_fragment::Fragment;
use conflux_identity::IdentityProvider;
use conflux_record::{OutputUnit, RecordField};

use crate::{Gateway, RequestContext};

/// Rows of one fragment, in reading order. A failed row does not end the iteration.
pub type RowIter = Box<dyn Iterator<Item = ConfluxResult<Vec<RecordField>>> + Send>;

/// Format-specific reading of fragments into typed rows, done as the session's identity.
pub trait RowReader<I>: Send + Sync {
    fn read(
        &self,
        fragment: &Fragment,
        ctx: &RequestContext,
        identity: &I,
    ) -> ConfluxResult<RowIter>;
}

/// What to do with a row that does not fit the declared schema or cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BadRecordPolicy {
    /// Report the row as an error unit and carry on with the stream.
    #[default]
    EmitErrorRecord,
    /// Fail the request.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub fragments: usize,
    pub records: usize,
    pub error_records: usize,
    pub bytes: usize,
}

/// Serves the read of one segment request, from its fragments to the encoded rows.
pub struct ReadBridge<P: IdentityProvider> {
    gateway: Arc<Gateway<P>>,
    reader: Arc<dyn RowReader<P::Identity>>,
    policy: BadRecordPolicy,
}

impl<P: IdentityProvider> ReadBridge<P> {
    pub fn new(gateway: Arc<Gateway<P>>, reader: Arc<dyn RowReader<P::Identity>>) -> Self {
        Self {
            gateway,
            reader,
            policy: BadRecordPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BadRecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reads every fragment assigned to the requesting segment and pushes the encoded output into
    /// `sink`.
    ///
    /// The session identity is held for the whole read and released on every exit path, destroyed
    /// right away when this is the segment's last request.
    ///
    /// Acquiring and releasing the identity call the [`IdentityProvider`] synchronously under the
    /// segment lock, on the thread polling this future.
    pub async fn read<S>(&self, ctx: &RequestContext, mut sink: S) -> ConfluxResult<ReadSummary>
    where
        S: FnMut(OutputUnit) -> ConfluxResult<()>,
    {
        let fragments = self.gateway.fragments_for_segment(ctx).await?;
        let mut encoder = self.gateway.encoder(ctx)?;
        let mut identity = self
            .gateway
            .identities()
            .acquire_guard(&ctx.session_key(), ctx.impersonate)?;
        identity.set_clean_on_release(ctx.last_fragment);

        let mut summary = ReadSummary::default();
        for fragment in &fragments {
            summary.fragments += 1;
            log::debug!("{} Reading fragment {}", identity.key(), fragment);
            let rows = self
                .reader
                .read(fragment, ctx, identity.identity())
                .map_err(|err| err.with_context(format!("Failed to open fragment {fragment}")))?;
            for row in rows {
                let encoded = row.and_then(|fields| {
                    encoder
                        .make_output(fields)
                        .map(|units| units.collect::<Vec<_>>())
                });
                match encoded {
                    Ok(units) => {
                        summary.records += 1;
                        for unit in units {
                            summary.bytes += unit.len();
                            sink(unit)?;
                        }
                    }
                    Err(err)
                        if err.is_row_error()
                            && self.policy == BadRecordPolicy::EmitErrorRecord =>
                    {
                        let unit = encoder.error_output(&err)?;
                        summary.error_records += 1;
                        summary.bytes += unit.len();
                        sink(unit)?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if let Some(unit) = encoder.take_partial_line() {
            log::warn!(
                "{} Stream ended in the middle of a line, sending {} trailing bytes",
                identity.key(),
                unit.len()
            );
            summary.bytes += unit.len();
            sink(unit)?;
        }

        identity.release()?;
        log::debug!(
            "{} Read {} records and {} bad records from {} fragments",
            ctx.session_key(),
            summary.records,
            summary.error_records,
            summary.fragments
        );
        Ok(summary)
    }
}
