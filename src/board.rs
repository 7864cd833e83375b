//! The single-user "current view": which stop is shown, its latest
//! arrivals, and the fragment that links back to it.
//!
//! Every load is tagged with a [`RequestToken`]. A response is applied only
//! if no newer load was started meanwhile; late responses are dropped.

use std::future::Future;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::models::ArrivalsView;
use crate::providers::ProviderError;
use crate::query::{self, ViewFragment};
use crate::sequence::{RequestSequencer, RequestToken};
use crate::stops::StopIndexData;
use crate::stops::search;

pub const RETRY_MESSAGE: &str = "Could not load arrivals. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    /// `<stop>` or `<stop>,<service>`, for `#fragment` links
    pub fragment: Option<String>,
    pub stop_code: Option<String>,
    pub service_filter: Option<String>,
    pub arrivals: Option<ArrivalsView>,
    /// Retryable message when the last load failed
    pub error: Option<String>,
    pub request_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardUpdate {
    Applied(BoardSnapshot),
    /// A newer load was started before this one finished
    Stale { request_id: u64 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("No bus stop matches \"{0}\". Type a bus stop code (5 digits).")]
    NoMatch(String),
    #[error("No bus stop to refresh")]
    NothingToRefresh,
    #[error("No favourite stops to refresh")]
    NoFavourites,
}

/// Turn a search box entry into a view target; names fall back to the first
/// stop index match
pub fn resolve(input: &str, index: &StopIndexData) -> Result<ViewFragment, BoardError> {
    let intent = query::parse(input);
    if let Some(code) = intent.stop_code {
        return Ok(ViewFragment::new(code, intent.service_filter));
    }

    search::matches(index, input, 1)
        .first()
        .map(|stop| ViewFragment::new(stop.code.clone(), None))
        .ok_or_else(|| BoardError::NoMatch(input.trim().to_string()))
}

#[derive(Debug, Default)]
pub struct Board {
    sequencer: RequestSequencer,
    state: RwLock<BoardSnapshot>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        self.state.read().await.clone()
    }

    pub async fn current_fragment(&self) -> Option<ViewFragment> {
        let state = self.state.read().await;
        state
            .stop_code
            .as_ref()
            .map(|code| ViewFragment::new(code.clone(), state.service_filter.clone()))
    }

    /// Load `target` and apply it if it is still the newest request
    pub async fn show_with<F, Fut>(&self, target: ViewFragment, fetch: F) -> BoardUpdate
    where
        F: FnOnce(ViewFragment) -> Fut,
        Fut: Future<Output = Result<ArrivalsView, ProviderError>>,
    {
        let token = self.sequencer.issue();
        debug!(request_id = token.value(), target = %target, "Loading board");

        let result = fetch(target.clone()).await;
        self.apply(token, target, result).await
    }

    /// Reload the stop currently shown
    pub async fn refresh_with<F, Fut>(&self, fetch: F) -> Result<BoardUpdate, BoardError>
    where
        F: FnOnce(ViewFragment) -> Fut,
        Fut: Future<Output = Result<ArrivalsView, ProviderError>>,
    {
        let target = self
            .current_fragment()
            .await
            .ok_or(BoardError::NothingToRefresh)?;
        Ok(self.show_with(target, fetch).await)
    }

    /// Reload the current stop, or the first favourite when nothing is shown.
    /// Does nothing while the favourites list is empty.
    pub async fn refresh_all_with<F, Fut>(
        &self,
        first_favourite: Option<String>,
        fetch: F,
    ) -> Result<BoardUpdate, BoardError>
    where
        F: FnOnce(ViewFragment) -> Fut,
        Fut: Future<Output = Result<ArrivalsView, ProviderError>>,
    {
        let first_favourite = first_favourite.ok_or(BoardError::NoFavourites)?;
        let target = match self.current_fragment().await {
            Some(target) => target,
            None => ViewFragment::new(first_favourite, None),
        };
        Ok(self.show_with(target, fetch).await)
    }

    /// Initial view: a valid fragment, else the first favourite, else empty
    pub async fn initial_with<F, Fut>(
        &self,
        fragment: Option<&str>,
        first_favourite: Option<String>,
        fetch: F,
    ) -> BoardUpdate
    where
        F: FnOnce(ViewFragment) -> Fut,
        Fut: Future<Output = Result<ArrivalsView, ProviderError>>,
    {
        let from_fragment = fragment.and_then(|f| match f.parse::<ViewFragment>() {
            Ok(target) => Some(target),
            Err(e) => {
                debug!(fragment = %f, error = %e, "Ignoring invalid fragment");
                None
            }
        });

        match from_fragment.or_else(|| first_favourite.map(|code| ViewFragment::new(code, None))) {
            Some(target) => self.show_with(target, fetch).await,
            None => BoardUpdate::Applied(self.snapshot().await),
        }
    }

    async fn apply(
        &self,
        token: RequestToken,
        target: ViewFragment,
        result: Result<ArrivalsView, ProviderError>,
    ) -> BoardUpdate {
        let mut state = self.state.write().await;
        if !self.sequencer.is_latest(token) {
            info!(request_id = token.value(), target = %target, "Discarding stale board response");
            return BoardUpdate::Stale {
                request_id: token.value(),
            };
        }

        let (arrivals, error) = match result {
            Ok(view) => (Some(view), None),
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to load arrivals for board");
                (None, Some(RETRY_MESSAGE.to_string()))
            }
        };

        *state = BoardSnapshot {
            fragment: Some(target.to_string()),
            stop_code: Some(target.stop_code),
            service_filter: target.service,
            arrivals,
            error,
            request_id: token.value(),
        };

        BoardUpdate::Applied(state.clone())
    }
}
