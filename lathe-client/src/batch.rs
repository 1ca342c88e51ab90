//! Batch inferencing input preparation
//!
//! Samples feature rows out of a CSV file and writes each row to its own
//! headerless file, the layout a file dataset for batch scoring expects.

use lathe_core::ValidationError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ClientError, Result};

fn csv_error(e: csv::Error) -> ClientError {
    ClientError::Parse(format!("invalid CSV: {e}"))
}

/// Sample `n` distinct rows of the named columns from a CSV with a header
///
/// Rows keep their order in the file. All rows are returned when the file
/// has `n` rows or fewer. The same `seed` always picks the same rows.
pub fn sample_rows<R: Read>(
    reader: R,
    columns: &[&str],
    n: usize,
    seed: u64,
) -> Result<Vec<Vec<String>>> {
    if columns.is_empty() {
        return Err(ValidationError::EmptyField("feature columns").into());
    }

    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let indices = columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|header| header == *column)
                .ok_or_else(|| ValidationError::InvalidData(format!("no column named '{column}'")))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let rows = reader
        .records()
        .map(|record| {
            let record = record.map_err(csv_error)?;
            Ok(indices
                .iter()
                .map(|&i| record.get(i).unwrap_or_default().to_string())
                .collect())
        })
        .collect::<Result<Vec<Vec<String>>>>()?;

    if n >= rows.len() {
        return Ok(rows);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, rows.len(), n).into_vec();
    picked.sort_unstable();

    Ok(picked.into_iter().map(|i| rows[i].clone()).collect())
}

/// Parse sampled rows as numeric features
pub fn to_features(rows: &[Vec<String>]) -> Result<Vec<Vec<f64>>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|value| {
                    value.trim().parse::<f64>().map_err(|_| {
                        ClientError::from(ValidationError::InvalidData(format!(
                            "'{value}' is not a number"
                        )))
                    })
                })
                .collect()
        })
        .collect()
}

/// Write each row to `<dir>/<i>.csv`, numbering from 1
///
/// Creates `dir` if needed and returns the files written.
pub fn write_batch_files(dir: impl AsRef<Path>, rows: &[Vec<String>]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let path = dir.join(format!("{}.csv", i + 1));
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_error)?;
        writer.write_record(row).map_err(csv_error)?;
        writer.flush()?;
        paths.push(path);
    }

    info!("Wrote {} batch file(s) to {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIABETES: &str = "\
PatientID,Pregnancies,PlasmaGlucose,Age,Diabetic
1354778,0,171,21,0
1147438,8,92,43,1
1640031,7,115,22,0
1883350,9,103,33,0
1424119,1,85,23,1
";

    #[test]
    fn test_sample_projects_columns() {
        let rows = sample_rows(DIABETES.as_bytes(), &["Pregnancies", "Age"], 10, 0).unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], vec!["0", "21"]);
    }

    #[test]
    fn test_sample_is_seeded_and_distinct() {
        let a = sample_rows(DIABETES.as_bytes(), &["PatientID"], 3, 42).unwrap();
        let b = sample_rows(DIABETES.as_bytes(), &["PatientID"], 3, 42).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        let mut ids: Vec<_> = a.iter().map(|r| r[0].clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_missing_column_rejected() {
        let err = sample_rows(DIABETES.as_bytes(), &["BMI"], 2, 0).unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidData(_))));
    }

    #[test]
    fn test_to_features() {
        let rows = vec![vec!["0".to_string(), "171".to_string()]];
        assert_eq!(to_features(&rows).unwrap(), vec![vec![0.0, 171.0]]);

        let bad = vec![vec!["n/a".to_string()]];
        assert!(to_features(&bad).is_err());
    }

    #[test]
    fn test_write_batch_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("batch-data");
        let rows = sample_rows(DIABETES.as_bytes(), &["Pregnancies", "PlasmaGlucose"], 2, 7).unwrap();

        let paths = write_batch_files(&out, &rows).unwrap();

        assert_eq!(paths, vec![out.join("1.csv"), out.join("2.csv")]);
        let first = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(first.trim_end(), rows[0].join(","));
    }
}
