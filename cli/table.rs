use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Error reading or writing TSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("The required column '{0}' was not found in the input file.")]
    ColumnNotFound(String),
    #[error(
        "Covariate column '{column}' is at position {position}, inside the {id_columns} identifier columns."
    )]
    CovariateInIdColumns {
        column: String,
        position: usize,
        id_columns: usize,
    },
    #[error("The input file has no sample columns after the identifier and covariate columns.")]
    NoSampleColumns,
    #[error("Line {line}, column '{column}': could not parse '{value}' as a number.")]
    Parse {
        line: usize,
        column: String,
        value: String,
    },
    #[error("Sample values do not form a rectangular matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// A depth table split into pass-through identifiers, the covariate and the sample matrix.
#[derive(Debug)]
pub struct DepthTable {
    pub id_names: Vec<String>,
    pub ids: Vec<Vec<String>>,
    pub covariate_name: String,
    pub covariate: Vec<f64>,
    pub sample_names: Vec<String>,
    pub samples: Array2<f64>,
}

fn parse_value(raw: &str, line: usize, column: &str) -> Result<f64, TableError> {
    raw.trim().parse::<f64>().map_err(|_| TableError::Parse {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Reads a tab-separated table with a header row.
///
/// The first `id_columns` columns are kept as text, `covariate_column` becomes the covariate
/// and every other column is a sample.
pub fn read_table(
    path: &Path,
    covariate_column: &str,
    id_columns: usize,
) -> Result<DepthTable, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let covariate_index = headers
        .iter()
        .position(|name| name == covariate_column)
        .ok_or_else(|| TableError::ColumnNotFound(covariate_column.to_string()))?;
    if covariate_index < id_columns {
        return Err(TableError::CovariateInIdColumns {
            column: covariate_column.to_string(),
            position: covariate_index,
            id_columns,
        });
    }
    let sample_indices: Vec<usize> = (id_columns..headers.len())
        .filter(|&index| index != covariate_index)
        .collect();
    if sample_indices.is_empty() {
        return Err(TableError::NoSampleColumns);
    }

    let mut ids: Vec<Vec<String>> = Vec::new();
    let mut covariate = Vec::new();
    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = row + 2;
        ids.push(record.iter().take(id_columns).map(str::to_string).collect());
        covariate.push(parse_value(
            &record[covariate_index],
            line,
            &headers[covariate_index],
        )?);
        for &index in &sample_indices {
            values.push(parse_value(&record[index], line, &headers[index])?);
        }
    }

    let samples = Array2::from_shape_vec((covariate.len(), sample_indices.len()), values)?;
    Ok(DepthTable {
        id_names: headers[..id_columns].to_vec(),
        ids,
        covariate_name: headers[covariate_index].clone(),
        covariate,
        sample_names: sample_indices
            .iter()
            .map(|&index| headers[index].clone())
            .collect(),
        samples,
    })
}

/// Writes identifiers, the covariate and the samples, in that column order.
pub fn write_table(table: &DepthTable, path: &Path) -> Result<(), TableError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    let header = table
        .id_names
        .iter()
        .chain(std::iter::once(&table.covariate_name))
        .chain(table.sample_names.iter());
    writer.write_record(header)?;

    let mut buffer = ryu::Buffer::new();
    let mut record: Vec<String> = Vec::new();
    for (row, values) in table.samples.rows().into_iter().enumerate() {
        record.clear();
        record.extend(table.ids[row].iter().cloned());
        record.push(buffer.format(table.covariate[row]).to_string());
        for &value in values.iter() {
            record.push(buffer.format(value).to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
