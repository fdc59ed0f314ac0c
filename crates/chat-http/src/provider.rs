//! Gateway URL source seen by the session layer

use async_trait::async_trait;

use crate::HttpError;

/// Something that can tell where the gateway lives
#[async_trait]
pub trait GatewayUrlProvider: Send + Sync {
    async fn gateway_url(&self) -> Result<String, HttpError>;
}

/// Fixed URL, for local servers and tests
#[derive(Debug, Clone)]
pub struct StaticGatewayUrl(String);

impl StaticGatewayUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

#[async_trait]
impl GatewayUrlProvider for StaticGatewayUrl {
    async fn gateway_url(&self) -> Result<String, HttpError> {
        Ok(self.0.clone())
    }
}
