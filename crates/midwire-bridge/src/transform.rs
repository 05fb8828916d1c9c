//! Hook for the external "prettify" reformatter.

/// Reformats an outbound payload before it is framed.
///
/// Applied once per chunk, and only when prettification is enabled in
/// [`BridgeConfig`](crate::BridgeConfig). Returning an empty buffer drops the chunk.
pub trait PayloadTransform: Send + Sync {
    fn transform(&self, payload: &[u8]) -> Vec<u8>;
}

impl<F> PayloadTransform for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn transform(&self, payload: &[u8]) -> Vec<u8> {
        self(payload)
    }
}
