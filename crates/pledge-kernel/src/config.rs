/// Static limits applied while contracts build promise graphs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on promises built across one transaction, callbacks
    /// included. Bounds arena growth under recursive callback graphs.
    pub max_promises_per_transaction: usize,
    /// Upper bound on the dependency set of a single `then`/`join`.
    pub max_dependencies_per_promise: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_promises_per_transaction: 256,
            max_dependencies_per_promise: 32,
        }
    }
}
