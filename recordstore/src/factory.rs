use crate::ports::Connector;
use shared::Result;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Lazily acquires one backend client and hands the same handle to every caller.
///
/// Build one per backend at startup, share it by reference, and call
/// [`ClientFactory::close`] at shutdown. Concurrent first calls are serialized
/// so only one connect attempt is in flight. A failed attempt memoizes
/// nothing; the next call starts over. `close` waits for in-flight
/// acquisitions to finish.
pub struct ClientFactory<C: Connector> {
    connector: C,
    client: RwLock<OnceCell<Arc<C::Client>>>,
}

impl<C: Connector> ClientFactory<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            client: RwLock::new(OnceCell::new()),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(backend = %self.connector.describe()))]
    pub async fn get_client(&self) -> Result<Arc<C::Client>> {
        let slot = self.client.read().await;
        let client = slot
            .get_or_try_init(|| async {
                info!("Connecting to {}", self.connector.describe());
                self.connector.connect().await.inspect_err(|e| {
                    warn!("Connection to {} failed: {}", self.connector.describe(), e);
                })
            })
            .await?;

        Ok(Arc::clone(client))
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.initialized()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Drop the memoized client and let the connector release it.
    /// Handles already cloned out stay usable until their holders drop them.
    pub async fn close(&self) -> Result<()> {
        let taken = self.client.write().await.take();
        match taken {
            Some(client) => {
                info!("Closing connection to {}", self.connector.describe());
                self.connector.disconnect(&client).await
            }
            None => {
                debug!("Close called with no open client");
                Ok(())
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for ClientFactory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("target", &self.connector.describe())
            .field(
                "connected",
                &self.client.try_read().map(|slot| slot.initialized()).ok(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Handle {
        serial: usize,
    }

    /// Fails the first `failures` attempts, then hands out numbered handles.
    struct FlakyConnector {
        attempts: AtomicUsize,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        failures: usize,
    }

    impl FlakyConnector {
        fn new(failures: usize) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                failures,
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Client = Handle;

        async fn connect(&self) -> Result<Arc<Handle>> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(Error::Connection(format!("attempt {} refused", attempt)));
            }
            let serial = self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Handle { serial }))
        }

        async fn disconnect(&self, _client: &Handle) -> Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn describe(&self) -> String {
            "flaky://test".to_string()
        }
    }

    #[tokio::test]
    async fn test_client_is_memoized() {
        let factory = ClientFactory::new(FlakyConnector::new(0));

        let first = factory.get_client().await.unwrap();
        let second = factory.get_client().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.connector().connects.load(Ordering::SeqCst), 1);
        assert!(factory.is_connected().await);
    }

    #[tokio::test]
    async fn test_failure_is_returned_and_not_memoized() {
        let factory = ClientFactory::new(FlakyConnector::new(2));

        let err = factory.get_client().await.err().unwrap();
        assert!(matches!(err, Error::Connection(_)));
        assert!(!factory.is_connected().await);

        assert!(factory.get_client().await.is_err());

        let client = factory.get_client().await.unwrap();
        assert_eq!(client.serial, 0);
        assert_eq!(factory.connector().attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_connect_once() {
        let factory = Arc::new(ClientFactory::new(FlakyConnector::new(0)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let factory = Arc::clone(&factory);
            handles.push(tokio::spawn(async move { factory.get_client().await }));
        }

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(factory.connector().connects.load(Ordering::SeqCst), 1);
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }

    #[tokio::test]
    async fn test_close_releases_and_allows_reconnect() {
        let factory = ClientFactory::new(FlakyConnector::new(0));

        // Closing before connecting is a no-op
        factory.close().await.unwrap();
        assert_eq!(factory.connector().disconnects.load(Ordering::SeqCst), 0);

        let first = factory.get_client().await.unwrap();
        factory.close().await.unwrap();
        assert!(!factory.is_connected().await);
        assert_eq!(factory.connector().disconnects.load(Ordering::SeqCst), 1);

        let second = factory.get_client().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.serial, 1);
    }

    #[tokio::test]
    async fn test_shared_factory_can_be_closed() {
        let factory = Arc::new(ClientFactory::new(FlakyConnector::new(0)));
        let first = factory.get_client().await.unwrap();

        let closer = Arc::clone(&factory);
        tokio::spawn(async move { closer.close().await })
            .await
            .unwrap()
            .unwrap();

        assert!(!factory.is_connected().await);
        assert_eq!(factory.connector().disconnects.load(Ordering::SeqCst), 1);

        let second = factory.get_client().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(factory.is_connected().await);
    }
}
