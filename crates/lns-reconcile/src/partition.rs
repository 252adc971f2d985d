/// Rejected partition request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionError {
    /// Batch size must be strictly positive.
    InvalidBatchSize(i64),
}

impl std::fmt::Display for PartitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionError::InvalidBatchSize(n) => {
                write!(f, "invalid configuration: batch size must be > 0 (got {n})")
            }
        }
    }
}

impl std::error::Error for PartitionError {}

/// Split `items` into contiguous, non-overlapping batches of `batch_size`.
///
/// Concatenating the output in order reproduces `items`. The last batch may be
/// shorter. An empty input yields no batches.
pub fn partition<T: Clone>(items: &[T], batch_size: i64) -> Result<Vec<Vec<T>>, PartitionError> {
    if batch_size <= 0 {
        return Err(PartitionError::InvalidBatchSize(batch_size));
    }
    // Larger than any slice we could hold: one batch.
    let size = usize::try_from(batch_size).unwrap_or(usize::MAX);
    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}
