use std::borrow::Cow;
use std::collections::VecDeque;
use std::collections::vec_deque::Drain;
use std::fmt::Write;

use bytes::{Bytes, BytesMut};
use conflux_error::{ConfluxError, ConfluxResult, conflux_bail, conflux_err};
use jiff::fmt::strtime;
use jiff::tz::TimeZone;

use crate::{
    Column, DataType, EncoderOptions, FieldValue, OutputFormat, OutputUnit, RecordCodec,
    RecordField, WireRecord,
};

const LINE_DELIMITER: u8 = b'\n';
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

fn to_hex(prefix: &str, bytes: &[u8]) -> Result<String, std::fmt::Error> {
    let mut output = String::with_capacity(prefix.len() + 2 * bytes.len());
    output.push_str(prefix);
    for byte in bytes {
        write!(output, "{:02x}", byte)?;
    }
    Ok(output)
}

enum Mode {
    Binary {
        record: Box<dyn WireRecord>,
        error_record: Box<dyn WireRecord>,
    },
    Text,
}

/// Serializes the rows of one request. Not shared between requests.
pub struct RecordEncoder {
    options: EncoderOptions,
    columns: Vec<Column>,
    mode: Mode,
    partial_line: Option<BytesMut>,
    output: VecDeque<OutputUnit>,
}

impl RecordEncoder {
    /// Binary output needs the `codec` owning the record layout; text output ignores it.
    pub fn new(
        columns: Vec<Column>,
        options: EncoderOptions,
        codec: Option<&dyn RecordCodec>,
    ) -> ConfluxResult<Self> {
        let mode = match options.output_format {
            OutputFormat::Binary => {
                let Some(codec) = codec else {
                    conflux_bail!("Binary output requires a record codec");
                };
                Mode::Binary {
                    record: codec.new_record(&columns)?,
                    error_record: codec.new_error_record()?,
                }
            }
            OutputFormat::Text => Mode::Text,
        };

        Ok(Self {
            options,
            columns,
            mode,
            partial_line: None,
            output: VecDeque::new(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encodes one row.
    ///
    /// Usually a row yields one unit. While sampling raw text it yields one unit per completed
    /// line, possibly none.
    pub fn make_output(
        &mut self,
        fields: Vec<RecordField>,
    ) -> ConfluxResult<Drain<'_, OutputUnit>> {
        self.output.clear();
        self.fill(fields)?;
        Ok(self.output.drain(..))
    }

    /// Encodes a batch of rows into a single queue. Fails on the first row that cannot be encoded.
    pub fn make_vectorized_output(
        &mut self,
        batch: Vec<Vec<RecordField>>,
    ) -> ConfluxResult<Drain<'_, OutputUnit>> {
        self.output.clear();
        for fields in batch {
            self.fill(fields)?;
        }
        Ok(self.output.drain(..))
    }

    /// Splits raw text into lines.
    ///
    /// Text after the last delimiter is kept as the pending partial line and prefixed to the first
    /// line of the next call.
    pub fn convert_text_data_to_lines(&mut self, data: Bytes) -> Drain<'_, OutputUnit> {
        self.output.clear();
        self.split_lines(data);
        self.output.drain(..)
    }

    /// The pending partial line, if any.
    pub fn partial_line(&self) -> Option<&[u8]> {
        self.partial_line.as_deref()
    }

    /// Removes the pending partial line, to be emitted unterminated at the end of the stream.
    pub fn take_partial_line(&mut self) -> Option<OutputUnit> {
        self.partial_line
            .take()
            .map(|line| OutputUnit::Line(line.freeze()))
    }

    /// The unit reporting `err` in place of a row.
    ///
    /// In binary mode this is the request's error record. In text mode it is a line whose last
    /// field carries the message, after one empty field per remaining column.
    pub fn error_output(&mut self, err: &ConfluxError) -> ConfluxResult<OutputUnit> {
        let message = err.to_string();
        match self.mode {
            Mode::Binary {
                ref mut error_record,
                ..
            } => {
                error_record.set_field(0, &RecordField::text(message))?;
                Ok(OutputUnit::Record(error_record.encode()?))
            }
            Mode::Text => {
                log::error!("{}", message);
                let csv = &self.options.csv;
                let mut line = csv
                    .delimiter_str()
                    .repeat(self.columns.len().saturating_sub(1));
                line.push_str(&csv.to_csv_field(&message, true, true, true));
                line.push_str(csv.newline());
                Ok(OutputUnit::Line(Bytes::from(line)))
            }
        }
    }

    fn fill(&mut self, fields: Vec<RecordField>) -> ConfluxResult<()> {
        match self.mode {
            Mode::Binary { ref mut record, .. } => {
                let unit = fill_record(&self.columns, &mut **record, &fields)?;
                self.output.push_back(unit);
                Ok(())
            }
            Mode::Text => self.fill_text(fields),
        }
    }

    fn fill_text(&mut self, fields: Vec<RecordField>) -> ConfluxResult<()> {
        let fields = match <[RecordField; 1]>::try_from(fields) {
            Ok([field]) => match field {
                RecordField {
                    data_type: DataType::Bytes,
                    value: Some(FieldValue::Bytes(bytes)),
                } => {
                    if self.options.sampling {
                        self.split_lines(bytes);
                    } else {
                        self.output.push_back(OutputUnit::Buffer(bytes));
                    }
                    return Ok(());
                }
                RecordField {
                    value: Some(FieldValue::Text(mut line)),
                    ..
                } => {
                    line.push_str(self.options.csv.newline());
                    self.output.push_back(OutputUnit::Line(Bytes::from(line)));
                    return Ok(());
                }
                field => vec![field],
            },
            Err(fields) => fields,
        };

        if fields.is_empty() {
            conflux_bail!(SchemaMismatch: "No fields in record");
        }
        let rendered = fields
            .iter()
            .map(|field| self.render(field))
            .collect::<ConfluxResult<Vec<_>>>()?;
        let mut line = rendered.join(&self.options.csv.delimiter_str());
        line.push_str(self.options.csv.newline());
        self.output.push_back(OutputUnit::Line(Bytes::from(line)));
        Ok(())
    }

    fn render<'a>(&'a self, field: &'a RecordField) -> ConfluxResult<Cow<'a, str>> {
        let csv = &self.options.csv;
        let Some(value) = &field.value else {
            return Ok(Cow::Borrowed(csv.null_value()));
        };

        Ok(match value {
            FieldValue::Bytes(bytes) => Cow::Owned(
                to_hex(self.options.table_format.hex_prefix(), bytes)
                    .map_err(|e| conflux_err!(InvalidData: "cannot render bytes: {}", e))?,
            ),
            FieldValue::Text(text) if field.data_type.is_character() => {
                csv.to_csv_field(text, true, true, true)
            }
            FieldValue::Text(text) => Cow::Borrowed(text.as_str()),
            FieldValue::Date(date) => Cow::Owned(strtime::format(DATE_FORMAT, *date)?),
            FieldValue::Time(time) => Cow::Owned(strtime::format(TIME_FORMAT, *time)?),
            FieldValue::Timestamp(datetime) => {
                Cow::Owned(strtime::format(TIMESTAMP_FORMAT, *datetime)?)
            }
            FieldValue::TimestampTz(timestamp) => Cow::Owned(strtime::format(
                TIMESTAMP_TZ_FORMAT,
                &timestamp.to_zoned(TimeZone::UTC),
            )?),
            FieldValue::Bool(v) => Cow::Owned(v.to_string()),
            FieldValue::Int16(v) => Cow::Owned(v.to_string()),
            FieldValue::Int32(v) => Cow::Owned(v.to_string()),
            FieldValue::Int64(v) => Cow::Owned(v.to_string()),
            FieldValue::Float32(v) => Cow::Owned(v.to_string()),
            FieldValue::Float64(v) => Cow::Owned(v.to_string()),
        })
    }

    fn split_lines(&mut self, data: Bytes) {
        let mut start = 0;
        while start < data.len() {
            let Some(offset) = data[start..].iter().position(|b| *b == LINE_DELIMITER) else {
                let rest = &data[start..];
                match self.partial_line.as_mut() {
                    Some(partial) => partial.extend_from_slice(rest),
                    None => self.partial_line = Some(BytesMut::from(rest)),
                }
                return;
            };

            let end = start + offset + 1;
            let line = match self.partial_line.take() {
                Some(mut partial) => {
                    partial.extend_from_slice(&data[start..end]);
                    partial.freeze()
                }
                None => data.slice(start..end),
            };
            self.output.push_back(OutputUnit::Line(line));
            start = end;
        }
    }
}

fn fill_record(
    columns: &[Column],
    record: &mut dyn WireRecord,
    fields: &[RecordField],
) -> ConfluxResult<OutputUnit> {
    if fields.is_empty() {
        conflux_bail!(SchemaMismatch: "No fields in record");
    }
    if fields.len() != columns.len() {
        conflux_bail!(
            SchemaMismatch: "Record has {} fields but the schema size is {}",
            fields.len(),
            columns.len()
        );
    }

    for (index, (field, column)) in fields.iter().zip(columns).enumerate() {
        if !column.data_type.accepts(&field.data_type) {
            conflux_bail!(
                SchemaMismatch: "For field {} schema requires type {} but input record has type {}",
                column.name,
                column.data_type,
                field.data_type
            );
        }
        record.set_field(index, field)?;
    }
    Ok(OutputUnit::Record(record.encode()?))
}
