//! Incremental content repository.
//!
//! Adapts the page-at-a-time list endpoints into one growable, ordered,
//! de-duplicated collection for a single content category, suitable for
//! infinite scrolling. Local mutations (favorite, delete) are applied in
//! place so a single-item change never needs a full reload.
//!
//! State is owned by the repository. Consumers read it through
//! [`ContentRepository::snapshot`] or watch it with
//! [`ContentRepository::subscribe`].

pub mod ordered;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{ApiError, CaptureQuery, CenterApi, DEFAULT_API_URL};
use crate::config::{
    Config, DEFAULT_REPOSITORY_PAGE_SIZE, DEFAULT_SEARCH_CONCURRENCY, DEFAULT_SEARCH_DEBOUNCE_MS,
};
use crate::media::{self, AssetDownload};
use crate::models::{ContentEnvelope, Page, SearchDomain};

pub use ordered::OrderedContentSet;

/// Content category a repository is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Captures,
    Notes,
}

impl ContentCategory {
    fn search_domain(&self) -> SearchDomain {
        match self {
            ContentCategory::Captures => SearchDomain::Captures,
            ContentCategory::Notes => SearchDomain::Notes,
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentCategory::Captures => write!(f, "captures"),
            ContentCategory::Notes => write!(f, "notes"),
        }
    }
}

/// Tunables for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub page_size: u32,
    pub search_debounce: Duration,
    pub search_concurrency: usize,
    /// API base used to build asset download URLs.
    pub api_url: String,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_REPOSITORY_PAGE_SIZE,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            search_concurrency: DEFAULT_SEARCH_CONCURRENCY,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl From<&Config> for RepositoryOptions {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size.max(1),
            search_debounce: config.search_debounce(),
            search_concurrency: config.search_concurrency.max(1),
            api_url: config.api_url.clone(),
        }
    }
}

/// Position of the most recently fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page_number: u32,
    pub total_pages: u32,
}

/// Point-in-time view of a repository.
#[derive(Debug, Clone, Default)]
pub struct RepositorySnapshot {
    /// Visible content in display order.
    pub items: Vec<ContentEnvelope>,
    pub is_loading: bool,
    pub is_searching: bool,
    /// True once any load has completed, successfully or not.
    pub has_loaded: bool,
    pub has_more_data: bool,
    pub cursor: Option<PageCursor>,
    /// True while search results, not the paged listing, are visible.
    /// Cleared by [`ContentRepository::reload`].
    pub showing_search_results: bool,
    /// Message of the last failed load or search, cleared by the next success.
    pub last_error: Option<String>,
}

impl RepositorySnapshot {
    pub fn has_content(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Result of a [`ContentRepository::search`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query was blank after trimming; nothing was sent.
    Skipped,
    /// A newer search (or reload) took over; results were discarded.
    Superseded,
    /// The server matched nothing; the visible collection was cleared.
    Cleared,
    /// The visible collection now holds this many search hits.
    Applied(usize),
    /// The search request failed; state is unchanged.
    Failed,
}

struct RepositoryState {
    content: OrderedContentSet,
    cursor: Option<PageCursor>,
    has_loaded: bool,
    has_more_data: bool,
    last_error: Option<String>,
    searching: bool,
    search_generation: u64,
    search_token: CancellationToken,
    /// Bumped whenever search results replace the listing; loads started
    /// under an older value are discarded.
    load_generation: u64,
    showing_results: bool,
}

impl RepositoryState {
    fn show_results(&mut self, content: OrderedContentSet) {
        self.content = content;
        self.last_error = None;
        self.load_generation += 1;
        self.showing_results = true;
    }
}

impl Default for RepositoryState {
    fn default() -> Self {
        Self {
            content: OrderedContentSet::new(),
            cursor: None,
            has_loaded: false,
            has_more_data: false,
            last_error: None,
            searching: false,
            search_generation: 0,
            search_token: CancellationToken::new(),
            load_generation: 0,
            showing_results: false,
        }
    }
}

/// Clears the in-flight flag when a load finishes or its future is dropped.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Paginated, de-duplicated collection of one content category.
pub struct ContentRepository<A: ?Sized> {
    api: Arc<A>,
    category: ContentCategory,
    options: RepositoryOptions,
    /// Admission flag: at most one load in flight, extra loads are dropped.
    loading: AtomicBool,
    state: Mutex<RepositoryState>,
    changes: watch::Sender<RepositorySnapshot>,
}

impl<A> ContentRepository<A>
where
    A: CenterApi + ?Sized,
{
    pub fn new(api: Arc<A>, category: ContentCategory) -> Self {
        Self::with_options(api, category, RepositoryOptions::default())
    }

    pub fn with_options(api: Arc<A>, category: ContentCategory, options: RepositoryOptions) -> Self {
        let (changes, _) = watch::channel(RepositorySnapshot::default());
        Self {
            api,
            category,
            options,
            loading: AtomicBool::new(false),
            state: Mutex::new(RepositoryState::default()),
            changes,
        }
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Returns the current state.
    pub async fn snapshot(&self) -> RepositorySnapshot {
        let state = self.state.lock().await;
        self.snapshot_of(&state)
    }

    /// Subscribes to state changes. The receiver always holds the latest
    /// published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RepositorySnapshot> {
        self.changes.subscribe()
    }

    /// Loads the first page unless a load has already completed.
    pub async fn initial(&self) {
        if self.state.lock().await.has_loaded {
            return;
        }
        self.load(0, false).await;
    }

    /// Replaces the collection with the first page, in server order.
    ///
    /// Cancels any in-flight search.
    pub async fn reload(&self) {
        self.cancel_search().await;
        self.load(0, true).await;
    }

    /// Fetches and appends the next page.
    ///
    /// Returns false without a request when nothing has been fetched yet,
    /// no more data exists, a load or search is in flight, or search
    /// results are visible.
    pub async fn load_more(&self) -> bool {
        let next_page = {
            let state = self.state.lock().await;
            let Some(cursor) = state.cursor else {
                return false;
            };
            if !state.has_more_data
                || state.searching
                || state.showing_results
                || self.is_loading()
            {
                return false;
            }
            cursor.page_number.saturating_add(1).min(cursor.total_pages)
        };

        tracing::debug!("Next {} page: {next_page}", self.category);
        self.load(next_page, false).await
    }

    /// Fetches one page and merges it, or replaces the collection when
    /// `reload` is set.
    ///
    /// Returns false if another load was in flight; no request is made in
    /// that case. Failures are logged and recorded in the snapshot, leaving
    /// the collection as it was. A page that arrives after search results
    /// replaced the listing is discarded.
    pub async fn load(&self, page: u32, reload: bool) -> bool {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Dropping load of {} page {page}: load in flight", self.category);
            return false;
        }
        let _guard = LoadingGuard(&self.loading);
        let generation = self.state.lock().await.load_generation;
        self.publish().await;

        let result = self.fetch_page(page).await;

        {
            let mut state = self.state.lock().await;
            match result {
                Ok(_) if state.load_generation != generation => {
                    tracing::debug!(
                        "Discarding {} page {page}: search results replaced the listing",
                        self.category
                    );
                }
                Ok(data) => {
                    let received = data.content.len();
                    let cursor = PageCursor {
                        page_number: data.page_number(),
                        total_pages: data.total_pages,
                    };
                    if reload {
                        state.content = data.content.into_iter().collect();
                        state.showing_results = false;
                    } else {
                        state.content.extend(data.content);
                    }
                    state.has_more_data = page.saturating_add(1) < data.total_pages;
                    state.cursor = Some(cursor);
                    state.last_error = None;
                    tracing::debug!(
                        "Loaded {} page {page}/{}: {received} items, {} visible",
                        self.category,
                        data.total_pages,
                        state.content.len()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to load {} page {page}: {e}", self.category);
                    state.last_error = Some(e.to_string());
                }
            }
            state.has_loaded = true;
        }

        drop(_guard);
        self.publish().await;
        true
    }

    async fn fetch_page(&self, page: u32) -> Result<Page<ContentEnvelope>, ApiError> {
        let size = self.options.page_size;
        match self.category {
            ContentCategory::Captures => {
                self.api
                    .list_captures(&CaptureQuery::page(page).with_size(size))
                    .await
            }
            ContentCategory::Notes => self.api.list_notes(page, size).await,
        }
    }

    /// Removes an item locally, then deletes it remotely.
    ///
    /// The local removal stands even if the remote delete fails; the error
    /// is returned. Unknown identifiers are ignored.
    pub async fn remove(&self, id: Uuid) -> Result<(), ApiError> {
        let removed = self.state.lock().await.content.remove(&id);
        let Some(item) = removed else {
            return Ok(());
        };
        self.publish().await;

        self.delete_remote(&item).await
    }

    /// Removes the items at the given display positions, then deletes them
    /// remotely in display order.
    ///
    /// Every delete is attempted; the first failure is returned.
    pub async fn remove_at(&self, offsets: &[usize]) -> Result<(), ApiError> {
        let removed = {
            let mut state = self.state.lock().await;
            let mut offsets = offsets.to_vec();
            offsets.sort_unstable();
            offsets.dedup();

            // Highest index first so earlier positions stay valid.
            let mut removed: Vec<ContentEnvelope> = offsets
                .iter()
                .rev()
                .filter_map(|&i| state.content.remove_at(i))
                .collect();
            removed.reverse();
            removed
        };
        if removed.is_empty() {
            return Ok(());
        }
        self.publish().await;

        let mut first_error = None;
        for item in &removed {
            if let Err(e) = self.delete_remote(item).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn delete_remote(&self, item: &ContentEnvelope) -> Result<(), ApiError> {
        match self.api.delete_content(item.uuid).await {
            Ok(_) => {
                tracing::debug!("Deleted {}", item.uuid);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to delete {}: {e}", item.uuid);
                Err(e)
            }
        }
    }

    /// Favorites or unfavorites the item remotely, then flips the local flag.
    ///
    /// Returns the new favorite state. On failure the local flag is left
    /// unchanged.
    pub async fn toggle_favorite(&self, item: &ContentEnvelope) -> Result<bool, ApiError> {
        let result = if item.favorite {
            self.api.unfavorite(item.uuid).await
        } else {
            self.api.favorite(item.uuid).await
        };
        if let Err(e) = result {
            tracing::warn!("Failed to toggle favorite on {}: {e}", item.uuid);
            return Err(e);
        }

        let favorite = !item.favorite;
        if let Some(local) = self.state.lock().await.content.get_mut(&item.uuid) {
            local.favorite = favorite;
        }
        self.publish().await;
        Ok(favorite)
    }

    /// Replaces the visible collection with search hits for `query`.
    ///
    /// Supersedes any search in flight. A blank query is skipped without a
    /// request. Otherwise the query is debounced, sent, and each hit is
    /// resolved from local content or fetched, with bounded concurrency and
    /// in relevance order. Hits that fail to fetch are dropped.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let (generation, token) = self.begin_search().await;

        let query = query.trim();
        let outcome = if query.is_empty() {
            SearchOutcome::Skipped
        } else {
            self.publish().await;
            self.run_search(query, generation, &token).await
        };

        self.end_search(generation).await;
        tracing::debug!("Search {generation} finished: {outcome:?}");
        outcome
    }

    async fn run_search(
        &self,
        query: &str,
        generation: u64,
        token: &CancellationToken,
    ) -> SearchOutcome {
        tokio::select! {
            _ = token.cancelled() => return SearchOutcome::Superseded,
            _ = tokio::time::sleep(self.options.search_debounce) => {}
        }

        let results = tokio::select! {
            _ = token.cancelled() => return SearchOutcome::Superseded,
            results = self.api.search(query, self.category.search_domain()) => results,
        };
        let ids = match results {
            Ok(results) => results.ids(),
            Err(e) => {
                tracing::warn!("Search for {} failed: {e}", self.category);
                let mut state = self.state.lock().await;
                if state.search_generation == generation {
                    state.last_error = Some(e.to_string());
                }
                return SearchOutcome::Failed;
            }
        };

        if ids.is_empty() {
            let mut state = self.state.lock().await;
            if state.search_generation != generation {
                return SearchOutcome::Superseded;
            }
            state.show_results(OrderedContentSet::new());
            return SearchOutcome::Cleared;
        }

        let local: HashMap<Uuid, ContentEnvelope> = {
            let state = self.state.lock().await;
            ids.iter()
                .filter_map(|id| state.content.get(id).map(|item| (*id, item.clone())))
                .collect()
        };

        let api = &*self.api;
        let local = &local;
        let resolved: Vec<Option<ContentEnvelope>> = stream::iter(ids)
            .map(|id| {
                let token = token.clone();
                async move {
                    match local.get(&id) {
                        Some(item) => Some(item.clone()),
                        None => fetch_hit(api, id, &token).await,
                    }
                }
            })
            .buffered(self.options.search_concurrency.max(1))
            .collect()
            .await;

        if token.is_cancelled() {
            return SearchOutcome::Superseded;
        }

        let mut state = self.state.lock().await;
        if state.search_generation != generation {
            return SearchOutcome::Superseded;
        }
        state.show_results(resolved.into_iter().flatten().collect());
        SearchOutcome::Applied(state.content.len())
    }

    /// Cancels the current search and starts a new generation.
    async fn begin_search(&self) -> (u64, CancellationToken) {
        let mut state = self.state.lock().await;
        state.search_token.cancel();
        state.search_token = CancellationToken::new();
        state.search_generation += 1;
        state.searching = true;
        (state.search_generation, state.search_token.clone())
    }

    async fn end_search(&self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.search_generation == generation {
                state.searching = false;
            }
        }
        self.publish().await;
    }

    /// Cancels any in-flight search without starting a new one.
    async fn cancel_search(&self) {
        let mut state = self.state.lock().await;
        if state.searching {
            state.search_token.cancel();
            state.search_generation += 1;
            state.searching = false;
        }
    }

    /// Downloads the item's primary media into `dir`.
    pub async fn export(&self, item: &ContentEnvelope, dir: &Path) -> Result<PathBuf, ApiError> {
        media::export(&*self.api, &self.options.api_url, item, dir).await
    }

    /// Downloads the item's still image, e.g. for copying to a clipboard.
    pub async fn image_bytes(&self, item: &ContentEnvelope) -> Result<Vec<u8>, ApiError> {
        let download = AssetDownload::image_for_content(&self.options.api_url, item)?;
        self.api.download_asset(&download).await
    }

    fn snapshot_of(&self, state: &RepositoryState) -> RepositorySnapshot {
        RepositorySnapshot {
            items: state.content.to_vec(),
            is_loading: self.is_loading(),
            is_searching: state.searching,
            has_loaded: state.has_loaded,
            has_more_data: state.has_more_data,
            cursor: state.cursor,
            showing_search_results: state.showing_results,
            last_error: state.last_error.clone(),
        }
    }

    async fn publish(&self) {
        let snapshot = {
            let state = self.state.lock().await;
            self.snapshot_of(&state)
        };
        self.changes.send_replace(snapshot);
    }
}

/// Fetches one search hit, giving up when the search is superseded.
async fn fetch_hit<A>(api: &A, id: Uuid, token: &CancellationToken) -> Option<ContentEnvelope>
where
    A: CenterApi + ?Sized,
{
    if token.is_cancelled() {
        return None;
    }

    tokio::select! {
        _ = token.cancelled() => None,
        result = api.fetch_memory(id) => match result {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!("Failed to fetch search hit {id}: {e}");
                None
            }
        },
    }
}
