use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Axis, EventData};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Extensions [`load_file`] understands.
pub const DATA_EXTENSIONS: [&str; 4] = ["parquet", "pq", "csv", "json"];

/// Load the event columns of a measurement.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one numeric column per feature (recommended)
/// * `.csv`     – header row of feature names, one event per row
/// * `.json`    – `{ "area": [...], "defo": [...] }` or `[{ "area": 1.0, ... }, ...]`
///
/// Columns whose name is not a known [`Axis`] are skipped.
pub fn load_file(path: &Path) -> Result<EventData> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let columns = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    EventData::from_columns(columns).map_err(|e| anyhow!("{}: {e}", path.display()))
}

fn axis_for(column: &str) -> Option<Axis> {
    match column.parse::<Axis>() {
        Ok(axis) => Some(axis),
        Err(_) => {
            log::debug!("skipping unknown column '{column}'");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Either column-oriented (`df.to_json(orient='list')`):
///
/// ```json
/// { "area": [120.5, 98.1], "defo": [0.021, 0.034] }
/// ```
///
/// or records-oriented (`df.to_json(orient='records')`):
///
/// ```json
/// [ { "area": 120.5, "defo": 0.021 }, { "area": 98.1, "defo": 0.034 } ]
/// ```
fn load_json(path: &Path) -> Result<BTreeMap<Axis, Vec<f64>>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let mut columns = BTreeMap::new();
    match &root {
        JsonValue::Object(obj) => {
            for (key, val) in obj {
                let Some(axis) = axis_for(key) else { continue };
                let arr = val
                    .as_array()
                    .with_context(|| format!("column '{key}' is not an array"))?;
                let values = arr
                    .iter()
                    .enumerate()
                    .map(|(j, v)| json_to_f64(v).with_context(|| format!("{key}[{j}]: not a number")))
                    .collect::<Result<Vec<f64>>>()?;
                columns.insert(axis, values);
            }
        }
        JsonValue::Array(records) => {
            for (i, rec) in records.iter().enumerate() {
                let obj = rec
                    .as_object()
                    .with_context(|| format!("Row {i} is not a JSON object"))?;
                for (key, val) in obj {
                    let Some(axis) = axis_for(key) else { continue };
                    let v = json_to_f64(val)
                        .with_context(|| format!("Row {i}, '{key}': not a number"))?;
                    let col: &mut Vec<f64> = columns.entry(axis).or_default();
                    if col.len() != i {
                        bail!("Row {i}: column '{key}' is missing in earlier rows");
                    }
                    col.push(v);
                }
            }
        }
        _ => bail!("Expected a JSON object or array at the top level"),
    }
    Ok(columns)
}

fn json_to_f64(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Null => Some(f64::NAN),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with feature names, one event per row.
/// Empty cells are read as NaN.
fn load_csv(path: &Path) -> Result<BTreeMap<Axis, Vec<f64>>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<Option<Axis>> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| axis_for(h.trim()))
        .collect();

    let mut columns: BTreeMap<Axis, Vec<f64>> = headers
        .iter()
        .flatten()
        .map(|axis| (*axis, Vec::new()))
        .collect();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (axis, cell) in headers.iter().zip(record.iter()) {
            let Some(axis) = axis else { continue };
            let cell = cell.trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>()
                    .with_context(|| format!("Row {row_no}, {axis}: '{cell}' is not a number"))?
            };
            if let Some(col) = columns.get_mut(axis) {
                col.push(value);
            }
        }
    }

    Ok(columns)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one numeric column (Float64, Float32, Int64 or
/// Int32) per feature. Nulls are read as NaN.
fn load_parquet(path: &Path) -> Result<BTreeMap<Axis, Vec<f64>>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: BTreeMap<Axis, Vec<f64>> = BTreeMap::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for (idx, field) in schema.fields().iter().enumerate() {
            let Some(axis) = axis_for(field.name()) else {
                continue;
            };
            let values = extract_f64_column(batch.column(idx))
                .with_context(|| format!("column '{}'", field.name()))?;
            columns.entry(axis).or_default().extend(values);
        }
    }

    Ok(columns)
}

// -- Parquet / Arrow helpers --

/// Read a flat numeric column as `f64`.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    fn collect<T, I>(iter: I, conv: impl Fn(T) -> f64) -> Vec<f64>
    where
        I: Iterator<Item = Option<T>>,
    {
        iter.map(|v| v.map_or(f64::NAN, &conv)).collect()
    }

    let any = col.as_any();
    let values = match col.data_type() {
        DataType::Float64 => {
            let arr = any.downcast_ref::<Float64Array>().context("expected Float64Array")?;
            collect(arr.iter(), |v| v)
        }
        DataType::Float32 => {
            let arr = any.downcast_ref::<Float32Array>().context("expected Float32Array")?;
            collect(arr.iter(), f64::from)
        }
        DataType::Int64 => {
            let arr = any.downcast_ref::<Int64Array>().context("expected Int64Array")?;
            collect(arr.iter(), |v| v as f64)
        }
        DataType::Int32 => {
            let arr = any.downcast_ref::<Int32Array>().context("expected Int32Array")?;
            collect(arr.iter(), f64::from)
        }
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_columns_map_onto_axes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("M1_data.csv");
        std::fs::write(&path, "Area,Defo,comment\n100,0.01,3\n200,,4\n").unwrap();
        let data = load_file(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.column(Axis::Area), Some(&[100.0, 200.0][..]));
        assert!(data.column(Axis::Defo).unwrap()[1].is_nan());
        assert_eq!(data.axes().count(), 2);
    }

    #[test]
    fn json_both_orientations() {
        let dir = tempfile::tempdir().unwrap();
        let cols = dir.path().join("a.json");
        std::fs::write(&cols, r#"{"area": [1, 2, 3], "circ": [0.9, 0.8, 0.7]}"#).unwrap();
        let data = load_file(&cols).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.value(Axis::Circ, 2), 0.7);

        let recs = dir.path().join("b.json");
        std::fs::write(&recs, r#"[{"area": 1, "defo": 0.1}, {"area": 2, "defo": 0.2}]"#).unwrap();
        let data = load_file(&recs).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.column(Axis::Defo), Some(&[0.1, 0.2][..]));
    }

    #[test]
    fn parquet_numeric_columns() {
        use arrow::array::ArrayRef;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("area", DataType::Float64, true),
            Field::new("frame", DataType::Int64, false),
            Field::new("label", DataType::Float32, false),
        ]));
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![Some(50.0), None])),
            Arc::new(Int64Array::from(vec![7, 9])),
            Arc::new(Float32Array::from(vec![1.0, 2.0])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("M1_data.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let data = load_file(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.value(Axis::Area, 0), 50.0);
        assert!(data.value(Axis::Area, 1).is_nan());
        assert_eq!(data.column(Axis::Frame), Some(&[7.0, 9.0][..]));
        // "label" is not an axis
        assert_eq!(data.axes().count(), 2);
    }

    #[test]
    fn unknown_extension_fails() {
        assert!(load_file(Path::new("M1_data.tdms")).is_err());
    }
}
