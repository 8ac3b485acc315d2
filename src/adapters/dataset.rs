//! Dataset reader for training.
//!
//! A `.csv` file is read as comma-separated [`LabeledRecord`] rows under a
//! header line; columns not in the record are ignored. Any other file is read
//! as a JSON array of [`LabeledRecord`] objects.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Dataset, DatasetError, LabeledRecord};

#[derive(Debug, thiserror::Error)]
pub enum DatasetLoadError {
    #[error("Failed to read dataset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dataset {path:?} is not a JSON array of records: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dataset {path:?} is not valid CSV: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Invalid(#[from] DatasetError),
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn parse_csv(path: &Path, bytes: &[u8]) -> Result<Vec<LabeledRecord>, DatasetLoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes)
        .deserialize()
        .collect::<Result<Vec<LabeledRecord>, _>>()
        .map_err(|source| DatasetLoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Read raw records without encoding them.
///
/// # Errors
/// Returns [`DatasetLoadError`] if the file is unreadable or malformed.
pub fn load_records(path: &Path) -> Result<Vec<LabeledRecord>, DatasetLoadError> {
    let bytes = fs::read(path).map_err(|source| DatasetLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if is_csv(path) {
        return parse_csv(path, &bytes);
    }
    serde_json::from_slice(&bytes).map_err(|source| DatasetLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and encode a dataset file.
///
/// # Errors
/// Returns [`DatasetLoadError`] if the file is unreadable, malformed, or a
/// record does not fit the feature contract.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetLoadError> {
    let records = load_records(path)?;
    let dataset = Dataset::from_records(&records)?;
    tracing::info!(
        "Loaded {} records from {:?} ({} positive)",
        dataset.len(),
        path,
        dataset.labels.iter().filter(|&&l| l == 1).count()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ROWS: &str = r#"[
        {"age":63,"sex":1,"cp":3,"trestbps":145,"chol":233,"fbs":1,"restecg":0,
         "thalach":150,"exang":0,"oldpeak":2.3,"slope":0,"ca":0,"thal":1,"target":1},
        {"age":67,"sex":1,"cp":0,"trestbps":160,"chol":286,"fbs":0,"restecg":0,
         "thalach":108,"exang":1,"oldpeak":1.5,"slope":1,"ca":3,"thal":2,"target":0}
    ]"#;

    #[test]
    fn test_load_dataset() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("heart.json");
        fs::write(&path, ROWS).expect("write");

        let ds = load_dataset(&path).expect("Should load dataset");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.labels, vec![1, 0]);
        assert_eq!(ds.rows[1].ca_3, 1.0);
    }

    #[test]
    fn test_load_csv_dataset() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("dataset.CSV");
        fs::write(
            &path,
            "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal,target,note\n\
             63,1,3,145,233,1,0,150,0,2.3,0,0,1,1,first\n\
             67, 1, 0, 160, 286, 0, 0, 108, 1, 1.5, 1, 3, 2, 0,second\n",
        )
        .expect("write");

        let records = load_records(&path).expect("Should read CSV");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].oldpeak, 2.3);
        assert_eq!(records[1].thalach, 108.0);

        let ds = load_dataset(&path).expect("Should load dataset");
        assert_eq!(ds.labels, vec![1, 0]);
        assert_eq!(ds.rows[1].ca_3, 1.0);
    }

    #[test]
    fn test_csv_missing_column_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("short.csv");
        fs::write(&path, "age,sex,cp\n63,1,3\n").expect("write");
        assert!(matches!(
            load_records(&path),
            Err(DatasetLoadError::Csv { .. })
        ));

        fs::write(&path, ROWS).expect("write");
        assert!(matches!(
            load_records(&path),
            Err(DatasetLoadError::Csv { .. })
        ));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            load_records(&dir.path().join("missing.json")),
            Err(DatasetLoadError::Io { .. })
        ));

        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"age": 1}"#).expect("write");
        assert!(matches!(
            load_records(&path),
            Err(DatasetLoadError::Parse { .. })
        ));

        fs::write(&path, ROWS.replace("\"thal\":2", "\"thal\":7")).expect("write");
        assert!(matches!(
            load_dataset(&path),
            Err(DatasetLoadError::Invalid(DatasetError::UnknownLevel { .. }))
        ));
    }
}
