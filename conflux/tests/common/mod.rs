#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use conflux::error::{ConfluxResult, conflux_bail, conflux_err};
use conflux::fragment::{
    Fragment, FragmentRequest, FragmentSource, FragmentSourceFactory, FragmentStats,
};
use conflux::identity::{IdentityProvider, SessionKey};
use conflux::record::{
    Column, DataType, FieldValue, OutputUnit, RecordCodec, RecordField, WireRecord,
};
use conflux::{Gateway, GatewayConfig, RequestContext, RowIter, RowReader};
use parking_lot::Mutex;

/// Lists `parts` fragments for every path but `/missing`, tagging each with its part number.
pub struct PartSource {
    parts: usize,
}

#[async_trait]
impl FragmentSource for PartSource {
    async fn list(&self, path: &str) -> ConfluxResult<Vec<Fragment>> {
        if path == "/missing" {
            conflux_bail!(PathNotFound: "File does not exist: {}", path);
        }
        if path == "/broken" {
            conflux_bail!(Computation: "namenode unreachable");
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok((0..self.parts)
            .map(|part| {
                Fragment::new(format!("{path}/part-{part}"))
                    .with_locations(["host-a", "host-b"])
                    .with_metadata(Bytes::from(part.to_string()))
            })
            .collect())
    }

    async fn stats(&self, _path: &str) -> ConfluxResult<FragmentStats> {
        let parts = u64::try_from(self.parts).unwrap_or(u64::MAX);
        Ok(FragmentStats::new(parts, 1 << 20, parts << 20))
    }
}

pub struct PartSources {
    pub parts: usize,
    pub created: AtomicUsize,
}

impl PartSources {
    pub fn new(parts: usize) -> Arc<Self> {
        Arc::new(Self {
            parts,
            created: AtomicUsize::new(0),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl FragmentSourceFactory for PartSources {
    fn create(&self, _request: &FragmentRequest) -> ConfluxResult<Arc<dyn FragmentSource>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PartSource { parts: self.parts }))
    }
}

/// Hands out identities named after the user and remembers the destroyed ones.
#[derive(Default)]
pub struct TicketProvider {
    pub created: AtomicUsize,
    pub destroyed: Mutex<Vec<String>>,
}

impl IdentityProvider for TicketProvider {
    type Identity = String;

    fn login_identity(&self, server_name: &str) -> ConfluxResult<String> {
        Ok(format!("gateway@{server_name}"))
    }

    fn create_impersonated(&self, user: &str, login: &String) -> ConfluxResult<String> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{user} via {login} #{n}"))
    }

    fn create_remote(
        &self,
        user: &str,
        session: &SessionKey,
        _security_enabled: bool,
    ) -> ConfluxResult<String> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{user}@{} #{n}", session.server_name()))
    }

    fn destroy(&self, identity: &String) -> ConfluxResult<()> {
        self.destroyed.lock().push(identity.clone());
        Ok(())
    }
}

/// Produces rows for a fragment from a closure over its part number.
pub struct PartReader<F>(pub F);

impl<F> RowReader<String> for PartReader<F>
where
    F: Fn(usize) -> Vec<ConfluxResult<Vec<RecordField>>> + Send + Sync,
{
    fn read(
        &self,
        fragment: &Fragment,
        _ctx: &RequestContext,
        identity: &String,
    ) -> ConfluxResult<RowIter> {
        if identity.is_empty() {
            conflux_bail!(Computation: "no identity");
        }
        let part = fragment
            .metadata()
            .and_then(|m| std::str::from_utf8(m).ok())
            .and_then(|m| m.parse::<usize>().ok())
            .ok_or_else(|| conflux_err!(InvalidData: "fragment {} has no part number", fragment))?;
        Ok(Box::new((self.0)(part).into_iter()))
    }
}

/// Three rows per part: `(part * 10 + i, "row part-i")`.
pub fn rows(part: usize) -> Vec<ConfluxResult<Vec<RecordField>>> {
    (0..3)
        .map(|i| {
            let id = i32::try_from(part * 10 + i).unwrap_or(i32::MAX);
            Ok(vec![
                RecordField::int32(id),
                RecordField::text(format!("row {part}-{i}")),
            ])
        })
        .collect()
}

pub fn columns() -> Vec<Column> {
    vec![Column::new("id", DataType::Int32), Column::new("name", DataType::TEXT)]
}

pub fn context(segment_id: u32, total_segments: u32) -> RequestContext {
    RequestContext {
        user: "alice".to_string(),
        server_name: "default".to_string(),
        transaction_id: "XID-42".to_string(),
        segment_id,
        total_segments,
        gp_session_id: 17,
        gp_command_count: 3,
        schema_name: "public".to_string(),
        table_name: "people".to_string(),
        data_source: "/data/people".to_string(),
        columns: columns(),
        impersonate: true,
        ..Default::default()
    }
}

pub fn gateway(sources: Arc<PartSources>) -> Arc<Gateway<TicketProvider>> {
    Arc::new(Gateway::new(
        GatewayConfig::default(),
        sources,
        TicketProvider::default(),
    ))
}

pub fn text(units: &[OutputUnit]) -> Vec<String> {
    units
        .iter()
        .map(|u| String::from_utf8_lossy(u.bytes()).into_owned())
        .collect()
}

/// Writes slots as `value|value`, prefixed with `E:` for error records.
pub struct PipeCodec;

struct PipeRecord {
    error: bool,
    slots: Vec<String>,
}

impl RecordCodec for PipeCodec {
    fn new_record(&self, columns: &[Column]) -> ConfluxResult<Box<dyn WireRecord>> {
        Ok(Box::new(PipeRecord {
            error: false,
            slots: vec![String::new(); columns.len()],
        }))
    }

    fn new_error_record(&self) -> ConfluxResult<Box<dyn WireRecord>> {
        Ok(Box::new(PipeRecord {
            error: true,
            slots: vec![String::new()],
        }))
    }
}

impl WireRecord for PipeRecord {
    fn set_field(&mut self, index: usize, field: &RecordField) -> ConfluxResult<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| conflux_err!("no slot {}", index))?;
        *slot = match &field.value {
            None => "NULL".to_string(),
            Some(FieldValue::Int32(v)) => v.to_string(),
            Some(FieldValue::Text(v)) => v.clone(),
            Some(_) => conflux_bail!(InvalidData: "unsupported value in slot {}", index),
        };
        Ok(())
    }

    fn encode(&self) -> ConfluxResult<Bytes> {
        let prefix = if self.error { "E:" } else { "" };
        Ok(Bytes::from(format!("{}{}", prefix, self.slots.join("|"))))
    }
}
