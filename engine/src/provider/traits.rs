//! Provider trait definition

use async_trait::async_trait;
use lancea_model::{BatchPayload, Epoch, Outcome, Preview, ResultItem};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{ProviderError, SinkClosed};

/// Which operations a provider implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub search: bool,
    pub preview: bool,
    pub execute: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        search: true,
        preview: true,
        execute: true,
    };

    pub const SEARCH_ONLY: Capabilities = Capabilities {
        search: true,
        preview: false,
        execute: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// A query as handed to one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub epoch: Epoch,
    /// The explicit selection the search was made with; empty means all
    pub provider_ids: Vec<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, epoch: Epoch) -> Self {
        Self {
            text: text.into(),
            epoch,
            provider_ids: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// What a provider pushes into its sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkItem {
    Batch(BatchPayload),
    /// A failure that does not end the search for this provider
    Error(ProviderError),
}

/// Where a provider sends result batches during a search
///
/// Every send fails with [`SinkClosed`] once the search has been superseded
/// or cancelled, which is the provider's signal to stop. Providers that do
/// long work between sends should also poll [`BatchSink::is_cancelled`].
#[derive(Debug, Clone)]
pub struct BatchSink {
    tx: mpsc::Sender<SinkItem>,
    cancel: CancellationToken,
}

impl BatchSink {
    pub fn new(tx: mpsc::Sender<SinkItem>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Create a sink and the receiving end of its channel
    pub fn channel(buffer: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<SinkItem>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx, cancel), rx)
    }

    /// Replace everything delivered so far
    pub async fn reset(&self, items: Vec<ResultItem>) -> Result<(), SinkClosed> {
        self.send(SinkItem::Batch(BatchPayload::Reset { items })).await
    }

    /// Add items after the ones already delivered
    pub async fn append(&self, items: Vec<ResultItem>) -> Result<(), SinkClosed> {
        self.send(SinkItem::Batch(BatchPayload::Append { items })).await
    }

    /// Splice items in at `at` within what this provider has delivered so far
    pub async fn insert(&self, at: usize, items: Vec<ResultItem>) -> Result<(), SinkClosed> {
        self.send(SinkItem::Batch(BatchPayload::Insert { at, items })).await
    }

    /// Report a recoverable failure and keep going
    pub async fn error(&self, err: ProviderError) -> Result<(), SinkClosed> {
        self.send(SinkItem::Error(err)).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the search this sink belongs to is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    async fn send(&self, item: SinkItem) -> Result<(), SinkClosed> {
        if self.cancel.is_cancelled() {
            debug!("BatchSink::send: cancelled, dropping item");
            return Err(SinkClosed);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SinkClosed),
            res = self.tx.send(item) => res.map_err(|_| SinkClosed),
        }
    }
}

/// A pluggable source of results, previews and actions
///
/// Implementations must be cheap to share (`Arc<dyn Provider>`). Each search
/// runs on its own task; a provider may be searched concurrently for
/// different epochs.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier, e.g. "emoji"
    fn id(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    /// Produce zero or more batches for `query`
    ///
    /// Returning `Ok(())` means the provider finished cleanly. Returning an
    /// error reports it once; batches already sent stay delivered.
    async fn search(&self, query: &Query, sink: BatchSink) -> Result<(), ProviderError>;

    async fn preview(&self, _key: &str) -> Result<Preview, ProviderError> {
        Err(ProviderError::Unsupported { operation: "preview" })
    }

    async fn execute(&self, _action: &str, _key: &str) -> Result<Outcome, ProviderError> {
        Err(ProviderError::Unsupported { operation: "execute" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl Provider for Silent {
        fn id(&self) -> &str {
            "silent"
        }

        async fn search(&self, _query: &Query, _sink: BatchSink) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_preview_and_execute_are_unsupported() {
        let provider = Silent;
        assert_eq!(provider.capabilities(), Capabilities::ALL);
        assert_eq!(provider.preview("k").await.unwrap_err().code(), "unsupported");
        assert_eq!(provider.execute("a", "k").await.unwrap_err().code(), "unsupported");
    }

    #[tokio::test]
    async fn test_sink_delivers_in_order() {
        let (sink, mut rx) = BatchSink::channel(8, CancellationToken::new());
        sink.reset(vec![ResultItem::new("p", "a", "A")]).await.unwrap();
        sink.error(ProviderError::failed("partial")).await.unwrap();
        sink.append(vec![ResultItem::new("p", "b", "B")]).await.unwrap();
        sink.insert(1, vec![ResultItem::new("p", "c", "C")]).await.unwrap();

        assert!(matches!(rx.recv().await, Some(SinkItem::Batch(BatchPayload::Reset { .. }))));
        assert!(matches!(rx.recv().await, Some(SinkItem::Error(_))));
        assert!(matches!(rx.recv().await, Some(SinkItem::Batch(BatchPayload::Append { .. }))));
        assert!(matches!(
            rx.recv().await,
            Some(SinkItem::Batch(BatchPayload::Insert { at: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn test_sink_refuses_after_cancel() {
        let cancel = CancellationToken::new();
        let (sink, _rx) = BatchSink::channel(8, cancel.clone());
        cancel.cancel();
        assert!(sink.is_cancelled());
        assert_eq!(sink.append(vec![]).await, Err(SinkClosed));
    }

    #[tokio::test]
    async fn test_sink_cancel_unblocks_full_channel() {
        let cancel = CancellationToken::new();
        let (sink, _rx) = BatchSink::channel(1, cancel.clone());
        sink.append(vec![]).await.unwrap();

        let blocked = tokio::spawn({
            let sink = sink.clone();
            async move { sink.append(vec![]).await }
        });
        tokio::task::yield_now().await;
        cancel.cancel();
        assert_eq!(blocked.await.unwrap(), Err(SinkClosed));
    }

    #[tokio::test]
    async fn test_sink_closed_receiver() {
        let (sink, rx) = BatchSink::channel(4, CancellationToken::new());
        drop(rx);
        assert!(sink.is_cancelled());
        assert_eq!(sink.reset(vec![]).await, Err(SinkClosed));
    }

    #[test]
    fn test_query_is_empty() {
        assert!(Query::new("   ", Epoch(1)).is_empty());
        assert!(!Query::new("joy", Epoch(1)).is_empty());
    }
}
