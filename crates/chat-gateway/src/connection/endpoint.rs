//! Last known good gateway URL

use std::sync::Arc;

use chat_common::SettingsStore;
use chat_http::{GatewayUrlProvider, HttpError};
use parking_lot::Mutex;

/// Settings key the resolved URL is persisted under
pub const GATEWAY_URL_KEY: &str = "gateway_url";

/// Single-slot cache in front of a [`GatewayUrlProvider`]
///
/// Shared by every shard of a process. The slot is cleared when a connect
/// attempt fails at the transport level so the next attempt re-resolves it.
pub struct GatewayEndpoint {
    provider: Arc<dyn GatewayUrlProvider>,
    cached: Mutex<Option<String>>,
    settings: Option<Arc<SettingsStore>>,
    version: u8,
}

impl GatewayEndpoint {
    pub fn new(provider: Arc<dyn GatewayUrlProvider>, version: u8) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
            settings: None,
            version,
        }
    }

    /// Seed the slot from, and write it back to, a settings file
    #[must_use]
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        *self.cached.get_mut() = settings.get::<String>(GATEWAY_URL_KEY);
        self.settings = Some(settings);
        self
    }

    /// Cached base URL, if any
    pub fn cached(&self) -> Option<String> {
        self.cached.lock().clone()
    }

    /// URL to open a connection against, including version and encoding
    pub async fn url(&self) -> Result<String, HttpError> {
        if let Some(base) = self.cached() {
            return Ok(connect_url(&base, self.version));
        }

        let base = self.provider.gateway_url().await?;
        *self.cached.lock() = Some(base.clone());
        self.persist(Some(base.clone())).await;
        Ok(connect_url(&base, self.version))
    }

    /// Drop the cached URL so the next [`url`](Self::url) re-resolves it
    pub async fn invalidate(&self) {
        if self.cached.lock().take().is_some() {
            tracing::debug!("Gateway url invalidated");
        }
        self.persist(None).await;
    }

    /// Write the slot through to the settings file off the runtime threads
    async fn persist(&self, url: Option<String>) {
        let Some(settings) = self.settings.clone() else {
            return;
        };
        let written = tokio::task::spawn_blocking(move || match url {
            Some(url) => settings.set(GATEWAY_URL_KEY, &url),
            None => settings.remove(GATEWAY_URL_KEY).map(|_| ()),
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "Failed to persist gateway url"),
            Err(err) => tracing::warn!(error = %err, "Gateway url persistence task failed"),
        }
    }
}

impl std::fmt::Debug for GatewayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayEndpoint")
            .field("cached", &*self.cached.lock())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Append the version and encoding query parameters
pub fn connect_url(base: &str, version: u8) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}v={version}&encoding=json")
}
