/// A base chain or rollup node query failed for reasons unrelated to the
/// queried content: connectivity, timeouts, or a malformed response.
///
/// Transient by nature, but the engine does not retry; the error propagates
/// out of the running cycle. Retry policy belongs to the RPC transport.
#[derive(Debug, thiserror::Error)]
#[error("{context}")]
pub(crate) struct SourceError {
    context: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl SourceError {
    pub(crate) fn new(
        context: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            context,
            source: source.into(),
        }
    }
}
