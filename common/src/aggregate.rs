use crate::record::BenchmarkRecord;

/// Concatenates per-category record sets in the order they are given.
///
/// Nothing is sorted or merged by key, so the source order decides the
/// legend order downstream when no explicit order is configured.
pub fn aggregate<I>(sets: I) -> Vec<BenchmarkRecord>
where
    I: IntoIterator<Item = Vec<BenchmarkRecord>>,
{
    sets.into_iter().flatten().collect()
}
