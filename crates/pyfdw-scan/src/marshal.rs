use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use datafusion_common::arrow::datatypes::{DataType, SchemaRef};
use datafusion_common::ScalarValue;

use crate::error::{ScanError, ScanResult};
use crate::record::{Record, Value};

/// The external date format used when a date value is turned into text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed row handed back to the host, one value per schema column.
pub type OutputTuple = Vec<ScalarValue>;

/// The host's text-to-type input function.
///
/// The marshaller only produces text; turning that text into the final column
/// representation is left to the host.
pub trait TypeInput: Send + Sync + fmt::Debug {
    /// Parses `text` into a value of `data_type`. `None` stands for SQL NULL.
    fn input(
        &self,
        text: Option<&str>,
        data_type: &DataType,
    ) -> datafusion_common::Result<ScalarValue>;
}

/// Parses text with the Arrow cast kernels.
#[derive(Debug, Default, Clone, Copy)]
pub struct CastTypeInput;

impl TypeInput for CastTypeInput {
    fn input(
        &self,
        text: Option<&str>,
        data_type: &DataType,
    ) -> datafusion_common::Result<ScalarValue> {
        match text {
            Some(text) => ScalarValue::try_from_string(text.to_string(), data_type),
            None => ScalarValue::try_from(data_type),
        }
    }
}

/// Converts the value into the text handed to the host type input.
/// Returns `None` for null values.
pub fn coerce_to_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::Boolean(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Integer(i) => Some(Cow::Owned(i.to_string())),
        // `Display` for `f64` never uses grouping separators or exponents.
        Value::Float(f) => Some(Cow::Owned(f.to_string())),
        Value::Decimal(s) | Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Date(d) => Some(Cow::Owned(d.format(DATE_FORMAT).to_string())),
    }
}

/// Binds records to a fixed table schema.
#[derive(Debug, Clone)]
pub struct RowMarshaller {
    schema: SchemaRef,
    input: Arc<dyn TypeInput>,
}

impl RowMarshaller {
    pub fn new(schema: SchemaRef, input: Arc<dyn TypeInput>) -> Self {
        Self { schema, input }
    }

    /// Builds one tuple from the record, querying it by the schema column names in order.
    ///
    /// The record is only read. A missing key or a value the host cannot parse
    /// for the column type fails the whole row.
    pub fn to_tuple(&self, record: &Record) -> ScanResult<OutputTuple> {
        self.schema
            .fields()
            .iter()
            .map(|field| {
                let value = record
                    .get(field.name())
                    .ok_or_else(|| ScanError::MissingColumn(field.name().clone()))?;
                let text = coerce_to_text(value);
                self.input
                    .input(text.as_deref(), field.data_type())
                    .map_err(|e| {
                        ScanError::marshalling(format!(
                            "cannot convert value {value:?} for column \"{}\" to {}: {e}",
                            field.name(),
                            field.data_type()
                        ))
                    })
            })
            .collect()
    }
}
