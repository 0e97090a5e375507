//! Fetch interception and the three caching strategies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, Request, Response};

use super::{OfflineRouter, Strategy};
use crate::fetch::is_same_origin;

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflinePage,
    /// The 503 built by [`Response::offline_error`].
    Synthetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedResponse {
    pub response: Response,
    pub source: ResponseSource,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    Respond(RoutedResponse),
}

fn routed(response: Response, source: ResponseSource, strategy: Strategy) -> RoutedResponse {
    RoutedResponse { response, source, strategy }
}

impl OfflineRouter {
    /// Route an intercepted request.
    ///
    /// Only same-origin GET requests are handled, and only once activated.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if !self.state().await.can_intercept_fetch() {
            return Ok(FetchOutcome::Passthrough);
        }
        if !request.is_get() || !is_same_origin(&request.url, &self.config.origin) {
            tracing::trace!(method = %request.method, url = %request.url, "passthrough");
            return Ok(FetchOutcome::Passthrough);
        }

        let strategy = self.config.classifier.classify(request.url.path());
        tracing::debug!(url = %request.url, strategy = %strategy, "routing request");

        let routed = match strategy {
            Strategy::NetworkFirst => self.network_first(request).await?,
            Strategy::CacheFirst => match self.cache_first(request).await {
                Ok(routed) => routed,
                Err(e) => self.fallback(request, strategy, e).await,
            },
            Strategy::StaleWhileRevalidate => match self.stale_while_revalidate(request).await {
                Ok(routed) => routed,
                Err(e) => self.fallback(request, strategy, e).await,
            },
        };
        Ok(FetchOutcome::Respond(routed))
    }

    /// Network, then any cached match. Navigations fall back to the offline
    /// page; other requests see the network error.
    async fn network_first(&self, request: &Request) -> Result<RoutedResponse, Error> {
        let strategy = Strategy::NetworkFirst;
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store_quietly(&self.config.partitions.dynamic, request, &response).await;
                }
                Ok(routed(response, ResponseSource::Network, strategy))
            }
            Err(e) => {
                if let Some(cached) = self.lookup_any_quietly(request).await {
                    tracing::debug!(url = %request.url, "network failed, serving cached copy");
                    return Ok(routed(cached, ResponseSource::Cache, strategy));
                }
                if request.is_navigation()
                    && let Some(page) = self.offline_page().await
                {
                    return Ok(routed(page, ResponseSource::OfflinePage, strategy));
                }
                Err(e)
            }
        }
    }

    /// Any cached copy with a background refresh into static; on a miss,
    /// network then store.
    async fn cache_first(&self, request: &Request) -> Result<RoutedResponse, Error> {
        let partition = &self.config.partitions.static_assets;
        self.cached_then_refresh(partition, request, Strategy::CacheFirst).await
    }

    /// Same shape as cache-first, against the dynamic partition.
    async fn stale_while_revalidate(&self, request: &Request) -> Result<RoutedResponse, Error> {
        let partition = &self.config.partitions.dynamic;
        self.cached_then_refresh(partition, request, Strategy::StaleWhileRevalidate)
            .await
    }

    /// `partition` is checked first, then every other partition. Refreshes and
    /// misses are written to `partition` only.
    async fn cached_then_refresh(
        &self, partition: &str, request: &Request, strategy: Strategy,
    ) -> Result<RoutedResponse, Error> {
        let cached = match self.lookup_quietly(partition, request).await {
            Some(hit) => Some(hit),
            None => self.lookup_any_quietly(request).await,
        };
        if let Some(cached) = cached {
            tracing::debug!(url = %request.url, refresh_into = %partition, "cache hit");
            self.spawn_refresh(partition, request).await;
            return Ok(routed(cached, ResponseSource::Cache, strategy));
        }

        let response = self.network.fetch(request).await?;
        if response.is_ok() {
            self.store_quietly(partition, request, &response).await;
        }
        Ok(routed(response, ResponseSource::Network, strategy))
    }

    /// Navigation gets the offline page; otherwise the best cached match;
    /// otherwise the synthetic 503.
    async fn fallback(&self, request: &Request, strategy: Strategy, error: Error) -> RoutedResponse {
        tracing::debug!(url = %request.url, error = %error, "falling back");

        if request.is_navigation()
            && let Some(page) = self.offline_page().await
        {
            return routed(page, ResponseSource::OfflinePage, strategy);
        }
        if let Some(cached) = self.lookup_any_quietly(request).await {
            return routed(cached, ResponseSource::Cache, strategy);
        }
        routed(Response::offline_error(), ResponseSource::Synthetic, strategy)
    }

    /// The cached offline page, if install stored it.
    async fn offline_page(&self) -> Option<Response> {
        let url = match self.config.url_for(&self.config.offline_page) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "offline page route is not a valid URL");
                return None;
            }
        };
        self.lookup_any_quietly(&Request::get(url)).await
    }

    async fn store_quietly(&self, partition: &str, request: &Request, response: &Response) {
        if let Err(e) = self.store.put(partition, request, response).await {
            tracing::warn!(url = %request.url, partition = %partition, error = %e, "cache write failed");
        }
    }

    async fn lookup_quietly(&self, partition: &str, request: &Request) -> Option<Response> {
        self.store.lookup(partition, request).await.unwrap_or_else(|e| {
            tracing::warn!(url = %request.url, error = %e, "cache read failed");
            None
        })
    }

    async fn lookup_any_quietly(&self, request: &Request) -> Option<Response> {
        self.store.lookup_any(request).await.unwrap_or_else(|e| {
            tracing::warn!(url = %request.url, error = %e, "cache read failed");
            None
        })
    }
}
