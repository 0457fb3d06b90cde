use conflux_fragment::FragmentRequest;
use conflux_identity::SessionKey;
use conflux_record::{Column, CsvOptions, EncoderOptions, OutputFormat, TableFormat};

/// Everything one segment request tells the gateway about the scan it is part of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub user: String,
    pub server_name: String,
    pub transaction_id: String,
    pub segment_id: u32,
    pub total_segments: u32,
    pub gp_session_id: i64,
    pub gp_command_count: i64,
    pub schema_name: String,
    pub table_name: String,
    pub data_source: String,
    pub filter_string: Option<String>,
    pub profile: Option<String>,
    pub output_format: OutputFormat,
    pub table_format: TableFormat,
    pub csv: CsvOptions,
    /// Declared columns of the external table.
    pub columns: Vec<Column>,
    /// Fraction of rows the caller samples for statistics, zero when not sampling.
    pub stats_sample_ratio: f32,
    /// Act as the requesting user on behalf of the gateway's own login.
    pub impersonate: bool,
    /// This is the segment's last request of the query, its identity may go right away.
    pub last_fragment: bool,
    pub ignore_missing_path: bool,
}

impl RequestContext {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(
            self.user.as_str(),
            self.segment_id,
            self.transaction_id.as_str(),
            self.server_name.as_str(),
        )
    }

    pub fn fragment_request(&self) -> FragmentRequest {
        FragmentRequest {
            user: self.user.clone(),
            server_name: self.server_name.clone(),
            transaction_id: self.transaction_id.clone(),
            schema_name: self.schema_name.clone(),
            table_name: self.table_name.clone(),
            data_source: self.data_source.clone(),
            filter_string: self.filter_string.clone(),
            profile: self.profile.clone(),
            segment_id: self.segment_id,
            total_segments: self.total_segments,
            gp_session_id: self.gp_session_id,
            gp_command_count: self.gp_command_count,
            ignore_missing_path: self.ignore_missing_path,
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.stats_sample_ratio > 0.0
    }

    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            output_format: self.output_format,
            table_format: self.table_format,
            csv: self.csv.clone(),
            sampling: self.is_sampling(),
        }
    }
}
