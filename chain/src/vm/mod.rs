//! Deterministic, bounded execution VM.
//!
//! The VM evaluates a named algorithm against an input dataset and
//! returns the serialized result. Input arrives either as a JSON
//! matrix of `f64` or as CSV with a header row, which is transcoded
//! before dispatch. The only algorithm today is K-Means
//! ([`kmeans`]); an empty algorithm identifier selects it by default.

use std::fmt;

pub mod kmeans;

/// Number of clusters the VM asks K-Means for.
pub const KMEANS_CLUSTERS: usize = 2;
/// Fixed number of K-Means refinement passes.
pub const KMEANS_MAX_ITERATIONS: usize = 10;

/// Token that selects the K-Means algorithm.
const KMEANS_TOKEN: &str = "KMeans";

/// Errors produced by VM execution.
#[derive(Debug)]
pub enum VmError {
    /// The input dataset was empty.
    EmptyInput,
    /// The input dataset could not be parsed.
    BadInput(String),
    /// The algorithm identifier names nothing this VM can run.
    UnsupportedAlgorithm,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::EmptyInput => write!(f, "input data is empty"),
            VmError::BadInput(msg) => write!(f, "failed to parse input data: {msg}"),
            VmError::UnsupportedAlgorithm => write!(f, "unsupported algorithm"),
        }
    }
}

impl std::error::Error for VmError {}

/// Executes `algorithm` over `data` and returns the serialized output.
///
/// `data` is a JSON matrix of `f64`, or CSV with a header row (detected
/// by the first non-whitespace byte not opening a JSON array). The
/// algorithm bytes select the implementation: empty means the default
/// (K-Means), otherwise they must contain the `"KMeans"` token.
pub fn run(algorithm: &[u8], data: &[u8]) -> Result<Vec<u8>, VmError> {
    if data.is_empty() {
        return Err(VmError::EmptyInput);
    }

    let matrix_json;
    let data = if looks_like_csv(data) {
        matrix_json = csv_to_matrix_json(data)?;
        matrix_json.as_slice()
    } else {
        data
    };

    if algorithm.is_empty() || String::from_utf8_lossy(algorithm).contains(KMEANS_TOKEN) {
        run_kmeans(data)
    } else {
        Err(VmError::UnsupportedAlgorithm)
    }
}

/// CSV heuristic: anything whose first non-whitespace byte does not
/// open a JSON array, and that contains a comma, is treated as CSV.
fn looks_like_csv(data: &[u8]) -> bool {
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') => false,
        Some(_) => data.contains(&b','),
        None => false,
    }
}

/// Transcodes CSV-with-header into a JSON matrix of `f64`.
///
/// The first row is skipped; every remaining cell must parse as a
/// decimal number.
fn csv_to_matrix_json(data: &[u8]) -> Result<Vec<u8>, VmError> {
    let text =
        std::str::from_utf8(data).map_err(|e| VmError::BadInput(format!("not UTF-8: {e}")))?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for line in text.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|cell| cell.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| VmError::BadInput(format!("bad CSV cell: {e}")))?;
        rows.push(row);
    }

    serde_json::to_vec(&rows).map_err(|e| VmError::BadInput(e.to_string()))
}

fn run_kmeans(data: &[u8]) -> Result<Vec<u8>, VmError> {
    let input: Vec<Vec<f64>> =
        serde_json::from_slice(data).map_err(|e| VmError::BadInput(e.to_string()))?;

    if input.is_empty() {
        return Err(VmError::EmptyInput);
    }

    let centroids = kmeans::cluster(&input, KMEANS_CLUSTERS, KMEANS_MAX_ITERATIONS);
    serde_json::to_vec(&centroids).map_err(|e| VmError::BadInput(e.to_string()))
}
