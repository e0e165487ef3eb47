//! Arrow and CSV interchange for [`Dataset`].

use super::{Dataset, Row, Scalar};
use crate::prelude::*;
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument};

impl Dataset {
    /// Builds a dataset from an Arrow record batch.
    ///
    /// Numeric columns become [`Scalar::Number`]; every other type is read
    /// through Arrow's display formatting and treated as an input string, so
    /// empty strings still mean null.
    #[instrument(skip(batch), fields(rows = batch.num_rows(), columns = batch.num_columns()))]
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let mut dataset = Dataset::new(columns.clone())?;

        let options = FormatOptions::default();
        let formatters = batch
            .columns()
            .iter()
            .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Preparing record batch formatters")?;

        for row_index in 0..batch.num_rows() {
            let mut row = Row::new();
            for (position, column) in columns.iter().enumerate() {
                let array = batch.column(position);
                let value = if array.is_null(row_index) {
                    None
                } else {
                    let text = formatters[position].value(row_index).to_string();
                    if array.data_type().is_numeric() {
                        text.parse::<f64>()
                            .ok()
                            .map(Scalar::Number)
                            .or_else(|| Scalar::from_input(&text))
                    } else {
                        Scalar::from_input(&text)
                    }
                };
                row.set(column.clone(), value);
            }
            dataset.rows.push(row);
        }

        debug!(rows = dataset.len(), "Converted record batch to dataset");
        Ok(dataset)
    }

    /// Renders the dataset as a record batch of nullable UTF-8 columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));

        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .map(|column| {
                let values: Vec<Option<String>> = self
                    .rows
                    .iter()
                    .map(|row| row.get(column).map(ToString::to_string))
                    .collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();

        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    /// Renders the dataset as CSV with a header row; nulls are empty fields.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let batch = self.to_record_batch()?;
        let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
        writer.write(&batch)?;
        Ok(writer.into_inner())
    }

    /// SHA-256 digest of the CSV rendering, hex encoded.
    ///
    /// Two datasets with the same fingerprint are byte-identical on output.
    pub fn fingerprint(&self) -> Result<String> {
        let csv = self.to_csv()?;
        Ok(hex::encode(Sha256::digest(&csv)))
    }
}
