/// External search index over keys. Updates are eventually consistent;
/// implementations log their own failures.
pub trait SearchIndex: Send + Sync {
    fn reindex(&self, key_ids: &[i64]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchIndex;

impl SearchIndex for NoopSearchIndex {
    fn reindex(&self, key_ids: &[i64]) {
        log::trace!("Search reindex skipped for {} keys", key_ids.len());
    }
}
