//! Ordered registry of shutdown handlers.

use futures::future::BoxFuture;

type Handler = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Entry {
    name: String,
    handler: Handler,
}

/// Shutdown handlers, run last-registered first.
///
/// Each handler runs at most once: [`ShutdownRegistry::run`] drains the list.
#[derive(Default)]
pub struct ShutdownRegistry {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for ShutdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.name))
            .finish()
    }
}

impl ShutdownRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name used in logs.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.entries.push(Entry {
            name: name.into(),
            handler: Box::new(move || Box::pin(handler())),
        });
    }

    /// Names of the registered handlers, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Number of pending handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handlers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run and remove every handler, most recently registered first.
    pub async fn run(&mut self) {
        while let Some(Entry { name, handler }) = self.entries.pop() {
            tracing::debug!(handler = %name, "Running shutdown handler");
            handler().await;
        }
    }
}
