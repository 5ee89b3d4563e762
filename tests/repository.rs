//! Integration tests for the incremental content repository
//!
//! The repository runs against an in-memory API double that serves a fixed
//! catalog in pages and records every call it receives.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pin_center::api::{ApiError, CaptureQuery, CenterApi, EventQuery};
use pin_center::media::AssetDownload;
use pin_center::models::{
    CaptureData, ContentData, ContentEnvelope, DeviceInfo, EventEnvelope, FeatureFlag, FileAsset,
    Note, NoteData, Page, Pageable, SearchDomain, SearchHit, SearchResults, Session, Subscription,
};
use pin_center::repository::{
    ContentCategory, ContentRepository, RepositoryOptions, SearchOutcome,
};
use tempfile::tempdir;
use tokio::sync::Notify;
use uuid::Uuid;

// =============================================================================
// Test Helpers
// =============================================================================

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn note(n: u128) -> ContentEnvelope {
    ContentEnvelope {
        uuid: id(n),
        user_created_at: Utc.timestamp_opt(1_700_000_000 + n as i64, 0).unwrap(),
        user_last_modified: None,
        favorite: false,
        data: ContentData::Note(NoteData {
            title: format!("Note {n}"),
            text: format!("text {n}"),
        }),
    }
}

fn capture(n: u128) -> ContentEnvelope {
    ContentEnvelope {
        data: ContentData::Capture(CaptureData {
            thumbnail: FileAsset {
                file_uuid: id(10_000 + n),
                access_token: "thumb".to_string(),
            },
            closeup_asset: None,
            video: None,
            location: Some("Lisbon".to_string()),
        }),
        ..note(n)
    }
}

fn catalog(count: u128) -> Vec<ContentEnvelope> {
    (1..=count).map(note).collect()
}

fn ids(items: &[ContentEnvelope]) -> Vec<u128> {
    items.iter().map(|item| item.uuid.as_u128()).collect()
}

fn options(page_size: u32) -> RepositoryOptions {
    RepositoryOptions {
        page_size,
        search_debounce: Duration::ZERO,
        search_concurrency: 4,
        api_url: "https://api.example.com".to_string(),
    }
}

fn unsupported<T>() -> Result<T, ApiError> {
    Err(ApiError::NotFound("unsupported in tests".to_string()))
}

/// In-memory API double.
#[derive(Default)]
struct FakeApi {
    catalog: Mutex<Vec<ContentEnvelope>>,
    page_requests: Mutex<Vec<u32>>,
    /// When set, list calls wait for a notification before answering.
    list_gate: Option<Arc<Notify>>,
    fail_list: AtomicBool,
    fail_delete: AtomicBool,
    fail_favorite: AtomicBool,
    deletes: Mutex<Vec<Uuid>>,
    favorite_calls: Mutex<Vec<(Uuid, bool)>>,
    /// Query -> hit ids. `None` models a response without `memories`.
    search_results: Mutex<HashMap<String, Option<Vec<Uuid>>>>,
    search_calls: Mutex<Vec<String>>,
    /// Items only reachable through the single-item endpoint.
    remote_only: Mutex<HashMap<Uuid, ContentEnvelope>>,
    missing: Mutex<HashSet<Uuid>>,
    fetch_delays: Mutex<HashMap<Uuid, Duration>>,
    fetch_calls: Mutex<Vec<Uuid>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    fn with_catalog(items: Vec<ContentEnvelope>) -> Self {
        Self {
            catalog: Mutex::new(items),
            ..Self::default()
        }
    }

    fn page_requests(&self) -> Vec<u32> {
        self.page_requests.lock().unwrap().clone()
    }

    fn set_search(&self, query: &str, hits: Option<Vec<Uuid>>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), hits);
    }

    fn add_remote(&self, item: ContentEnvelope, delay: Duration) {
        self.fetch_delays.lock().unwrap().insert(item.uuid, delay);
        self.remote_only.lock().unwrap().insert(item.uuid, item);
    }

    async fn page(&self, page: u32, size: u32) -> Result<Page<ContentEnvelope>, ApiError> {
        self.page_requests.lock().unwrap().push(page);
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected { status: 500 });
        }

        let catalog = self.catalog.lock().unwrap();
        let size = size as usize;
        let total_pages = catalog.len().div_ceil(size) as u32;
        let start = (page as usize * size).min(catalog.len());
        let end = (start + size).min(catalog.len());

        Ok(Page {
            content: catalog[start..end].to_vec(),
            pageable: Pageable {
                page_number: page,
                page_size: size as u32,
            },
            total_pages,
            total_elements: Some(catalog.len() as u64),
            last: page.saturating_add(1) >= total_pages,
        })
    }
}

#[async_trait]
impl CenterApi for FakeApi {
    async fn fetch_session(&self) -> Result<Session, ApiError> {
        unsupported()
    }

    async fn list_captures(&self, query: &CaptureQuery) -> Result<Page<ContentEnvelope>, ApiError> {
        self.page(query.page, query.size).await
    }

    async fn list_notes(&self, page: u32, size: u32) -> Result<Page<ContentEnvelope>, ApiError> {
        self.page(page, size).await
    }

    async fn list_events(&self, _query: &EventQuery) -> Result<Page<EventEnvelope>, ApiError> {
        unsupported()
    }

    async fn create_note(&self, _note: &Note) -> Result<ContentEnvelope, ApiError> {
        unsupported()
    }

    async fn update_note(&self, _id: Uuid, _note: &Note) -> Result<ContentEnvelope, ApiError> {
        unsupported()
    }

    async fn favorite(&self, id: Uuid) -> Result<(), ApiError> {
        self.favorite_calls.lock().unwrap().push((id, true));
        if self.fail_favorite.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected { status: 500 });
        }
        Ok(())
    }

    async fn unfavorite(&self, id: Uuid) -> Result<(), ApiError> {
        self.favorite_calls.lock().unwrap().push((id, false));
        if self.fail_favorite.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected { status: 500 });
        }
        Ok(())
    }

    async fn delete_content(&self, id: Uuid) -> Result<String, ApiError> {
        self.deletes.lock().unwrap().push(id);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected { status: 500 });
        }
        Ok(id.to_string())
    }

    async fn fetch_memory(&self, id: Uuid) -> Result<ContentEnvelope, ApiError> {
        self.fetch_calls.lock().unwrap().push(id);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.fetch_delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.missing.lock().unwrap().contains(&id) {
            return Err(ApiError::Rejected { status: 404 });
        }
        let remote = self.remote_only.lock().unwrap().get(&id).cloned();
        match remote {
            Some(item) => Ok(item),
            None => self
                .catalog
                .lock()
                .unwrap()
                .iter()
                .find(|item| item.uuid == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(id.to_string())),
        }
    }

    async fn search(&self, query: &str, _domain: SearchDomain) -> Result<SearchResults, ApiError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        let hits = self.search_results.lock().unwrap().get(query).cloned();
        match hits {
            Some(hits) => Ok(SearchResults {
                memories: hits.map(|ids| ids.into_iter().map(|uuid| SearchHit { uuid }).collect()),
            }),
            None => Err(ApiError::Rejected { status: 500 }),
        }
    }

    async fn fetch_subscription(&self) -> Result<Subscription, ApiError> {
        unsupported()
    }

    async fn fetch_feature_flag(&self, _name: &str) -> Result<FeatureFlag, ApiError> {
        unsupported()
    }

    async fn fetch_detailed_device_info(&self) -> Result<DeviceInfo, ApiError> {
        unsupported()
    }

    async fn download_asset(&self, asset: &AssetDownload) -> Result<Vec<u8>, ApiError> {
        Ok(asset.memory_id.as_bytes().to_vec())
    }
}

fn notes_repo(api: Arc<FakeApi>, page_size: u32) -> ContentRepository<FakeApi> {
    ContentRepository::with_options(api, ContentCategory::Notes, options(page_size))
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_paginates_to_the_end() {
    let api = Arc::new(FakeApi::with_catalog(catalog(65)));
    let repo = notes_repo(api.clone(), 30);

    repo.initial().await;
    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items.len(), 30);
    assert!(snapshot.has_more_data);

    assert!(repo.load_more().await);
    assert_eq!(repo.snapshot().await.items.len(), 60);

    assert!(repo.load_more().await);
    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items.len(), 65);
    assert!(!snapshot.has_more_data);
    assert_eq!(ids(&snapshot.items), (1..=65).collect::<Vec<_>>());

    assert!(!repo.load_more().await);
    assert_eq!(api.page_requests(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_initial_loads_once() {
    let api = Arc::new(FakeApi::with_catalog(catalog(5)));
    let repo = notes_repo(api.clone(), 30);

    repo.initial().await;
    repo.initial().await;

    assert_eq!(api.page_requests(), vec![0]);
    let snapshot = repo.snapshot().await;
    assert!(snapshot.has_loaded);
    assert!(!snapshot.has_more_data);
    assert!(snapshot.has_content());
}

#[tokio::test]
async fn test_load_more_before_initial_is_noop() {
    let api = Arc::new(FakeApi::with_catalog(catalog(5)));
    let repo = notes_repo(api.clone(), 2);

    assert!(!repo.load_more().await);
    assert!(api.page_requests().is_empty());
}

#[tokio::test]
async fn test_empty_catalog() {
    let api = Arc::new(FakeApi::with_catalog(Vec::new()));
    let repo = notes_repo(api.clone(), 30);

    repo.initial().await;
    let snapshot = repo.snapshot().await;

    assert!(snapshot.has_loaded);
    assert!(!snapshot.has_content());
    assert!(!snapshot.has_more_data);
    assert!(!repo.load_more().await);
}

#[tokio::test]
async fn test_overlapping_load_is_dropped() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeApi {
        list_gate: Some(gate.clone()),
        ..FakeApi::with_catalog(catalog(10))
    });
    let repo = notes_repo(api.clone(), 5);

    let ((), second_accepted) = tokio::join!(repo.initial(), async {
        while api.page_requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(repo.is_loading());
        let accepted = repo.load(1, false).await;
        gate.notify_one();
        accepted
    });

    assert!(!second_accepted);
    assert_eq!(api.page_requests(), vec![0]);
    assert!(!repo.is_loading());
    assert_eq!(repo.snapshot().await.items.len(), 5);
}

#[tokio::test]
async fn test_merge_skips_duplicates_when_pages_shift() {
    let api = Arc::new(FakeApi::with_catalog(catalog(4)));
    let repo = notes_repo(api.clone(), 2);

    repo.initial().await;
    assert_eq!(ids(&repo.snapshot().await.items), vec![1, 2]);

    // A new note at the head pushes note 2 onto page 1.
    api.catalog.lock().unwrap().insert(0, note(99));
    repo.load_more().await;

    assert_eq!(ids(&repo.snapshot().await.items), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reload_replaces_content() {
    let api = Arc::new(FakeApi::with_catalog(catalog(6)));
    let repo = notes_repo(api.clone(), 2);

    repo.initial().await;
    repo.load_more().await;
    assert_eq!(repo.snapshot().await.items.len(), 4);

    *api.catalog.lock().unwrap() = vec![note(7), note(3), note(1)];
    repo.reload().await;

    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![7, 3]);
    assert!(snapshot.has_more_data);
    assert_eq!(snapshot.cursor.map(|c| c.page_number), Some(0));
}

#[tokio::test]
async fn test_failed_load_keeps_content_and_records_error() {
    let api = Arc::new(FakeApi::with_catalog(catalog(4)));
    let repo = notes_repo(api.clone(), 2);

    repo.initial().await;
    api.fail_list.store(true, Ordering::SeqCst);
    assert!(repo.load_more().await);

    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![1, 2]);
    assert!(snapshot.last_error.is_some());
    assert!(!repo.is_loading());

    api.fail_list.store(false, Ordering::SeqCst);
    repo.load_more().await;
    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![1, 2, 3, 4]);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn test_captures_category_uses_capture_listing() {
    let api = Arc::new(FakeApi::with_catalog(vec![capture(1), capture(2)]));
    let repo = ContentRepository::with_options(api.clone(), ContentCategory::Captures, options(30));

    repo.initial().await;
    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items.len(), 2);
    assert!(snapshot.items.iter().all(|item| item.capture().is_some()));
}

#[tokio::test]
async fn test_subscribers_see_published_state() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api, 30);
    let rx = repo.subscribe();

    repo.initial().await;

    let snapshot = rx.borrow().clone();
    assert!(snapshot.has_loaded);
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.items.len(), 3);
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_toggle_favorite_flips_after_remote_success() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    let item = repo.snapshot().await.items[1].clone();
    assert!(repo.toggle_favorite(&item).await.unwrap());

    let snapshot = repo.snapshot().await;
    assert!(snapshot.items[1].favorite);
    assert!(!snapshot.items[0].favorite);

    let item = snapshot.items[1].clone();
    assert!(!repo.toggle_favorite(&item).await.unwrap());
    assert!(!repo.snapshot().await.items[1].favorite);

    assert_eq!(
        *api.favorite_calls.lock().unwrap(),
        vec![(id(2), true), (id(2), false)]
    );
}

#[tokio::test]
async fn test_toggle_favorite_failure_leaves_flag() {
    let api = Arc::new(FakeApi::with_catalog(catalog(2)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;
    api.fail_favorite.store(true, Ordering::SeqCst);

    let item = repo.snapshot().await.items[0].clone();
    let err = repo.toggle_favorite(&item).await.unwrap_err();

    assert!(matches!(err, ApiError::Rejected { status: 500 }));
    assert!(!repo.snapshot().await.items[0].favorite);
}

#[tokio::test]
async fn test_remove_is_optimistic() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;
    api.fail_delete.store(true, Ordering::SeqCst);

    assert!(repo.remove(id(2)).await.is_err());

    assert_eq!(ids(&repo.snapshot().await.items), vec![1, 3]);
    assert_eq!(*api.deletes.lock().unwrap(), vec![id(2)]);
}

#[tokio::test]
async fn test_remove_unknown_id_makes_no_call() {
    let api = Arc::new(FakeApi::with_catalog(catalog(2)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    repo.remove(id(42)).await.unwrap();

    assert!(api.deletes.lock().unwrap().is_empty());
    assert_eq!(repo.snapshot().await.items.len(), 2);
}

#[tokio::test]
async fn test_remove_at_offsets() {
    let api = Arc::new(FakeApi::with_catalog(catalog(5)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    repo.remove_at(&[3, 0, 3, 9]).await.unwrap();

    assert_eq!(ids(&repo.snapshot().await.items), vec![2, 3, 5]);
    assert_eq!(*api.deletes.lock().unwrap(), vec![id(1), id(4)]);
}

#[tokio::test]
async fn test_export_writes_capture_media() {
    let api = Arc::new(FakeApi::with_catalog(vec![capture(1)]));
    let repo = ContentRepository::with_options(api, ContentCategory::Captures, options(30));
    repo.initial().await;

    let dir = tempdir().unwrap();
    let item = repo.snapshot().await.items[0].clone();
    let written = repo.export(&item, dir.path()).await.unwrap();

    assert_eq!(written, dir.path().join(format!("{}.jpg", id(1))));
    assert_eq!(std::fs::read(&written).unwrap(), id(1).as_bytes().to_vec());
    assert_eq!(repo.image_bytes(&item).await.unwrap(), id(1).as_bytes().to_vec());
}

#[tokio::test]
async fn test_export_rejects_notes() {
    let api = Arc::new(FakeApi::with_catalog(catalog(1)));
    let repo = notes_repo(api, 30);
    repo.initial().await;

    let dir = tempdir().unwrap();
    let item = repo.snapshot().await.items[0].clone();
    assert!(matches!(
        repo.export(&item, dir.path()).await,
        Err(ApiError::NotFound(_))
    ));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_blank_search_is_skipped() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    assert_eq!(repo.search("   ").await, SearchOutcome::Skipped);

    assert!(api.search_calls.lock().unwrap().is_empty());
    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items.len(), 3);
    assert!(!snapshot.is_searching);
}

#[tokio::test]
async fn test_search_without_hits_clears_content() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    api.set_search("nothing", None);
    api.set_search("empty", Some(Vec::new()));
    let repo = notes_repo(api.clone(), 30);

    repo.initial().await;
    assert_eq!(repo.search("nothing").await, SearchOutcome::Cleared);
    assert!(!repo.snapshot().await.has_content());

    repo.reload().await;
    assert_eq!(repo.search(" empty ").await, SearchOutcome::Cleared);
    assert!(!repo.snapshot().await.has_content());
    assert_eq!(
        *api.search_calls.lock().unwrap(),
        vec!["nothing".to_string(), "empty".to_string()]
    );
}

#[tokio::test]
async fn test_search_failure_keeps_content() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    assert_eq!(repo.search("unknown").await, SearchOutcome::Failed);

    let snapshot = repo.snapshot().await;
    assert_eq!(snapshot.items.len(), 3);
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.is_searching);
}

#[tokio::test]
async fn test_search_preserves_relevance_order_and_reuses_local_items() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    // The slowest fetch is ranked first.
    api.add_remote(note(50), Duration::from_millis(40));
    api.add_remote(note(51), Duration::from_millis(1));
    api.missing.lock().unwrap().insert(id(52));
    api.set_search("mixed", Some(vec![id(50), id(2), id(52), id(51)]));

    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    assert_eq!(repo.search("mixed").await, SearchOutcome::Applied(3));

    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![50, 2, 51]);
    assert!(!snapshot.is_searching);

    let fetched: HashSet<Uuid> = api.fetch_calls.lock().unwrap().iter().copied().collect();
    assert_eq!(fetched, HashSet::from([id(50), id(51), id(52)]));
}

#[tokio::test]
async fn test_search_fetches_are_bounded() {
    let api = Arc::new(FakeApi::default());
    let hits: Vec<Uuid> = (100..110).map(id).collect();
    for n in 100..110 {
        api.add_remote(note(n), Duration::from_millis(5));
    }
    api.set_search("many", Some(hits));

    let mut opts = options(30);
    opts.search_concurrency = 2;
    let repo = ContentRepository::with_options(api.clone(), ContentCategory::Notes, opts);

    assert_eq!(repo.search("many").await, SearchOutcome::Applied(10));
    assert!(api.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(ids(&repo.snapshot().await.items), (100..110).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_newer_search_supersedes_older() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    api.set_search("first", Some(vec![id(1)]));
    api.set_search("second", Some(vec![id(3), id(2)]));

    let mut opts = options(30);
    opts.search_debounce = Duration::from_millis(30);
    let repo = ContentRepository::with_options(api.clone(), ContentCategory::Notes, opts);
    repo.initial().await;

    let (first, second) = tokio::join!(repo.search("first"), repo.search("second"));

    assert_eq!(first, SearchOutcome::Superseded);
    assert_eq!(second, SearchOutcome::Applied(2));
    assert_eq!(*api.search_calls.lock().unwrap(), vec!["second".to_string()]);
    assert_eq!(ids(&repo.snapshot().await.items), vec![3, 2]);
}

#[tokio::test]
async fn test_blank_search_cancels_pending_search() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    api.set_search("beach", Some(vec![id(1)]));

    let mut opts = options(30);
    opts.search_debounce = Duration::from_millis(30);
    let repo = ContentRepository::with_options(api.clone(), ContentCategory::Notes, opts);
    repo.initial().await;

    let (pending, blank) = tokio::join!(repo.search("beach"), repo.search(""));

    assert_eq!(pending, SearchOutcome::Superseded);
    assert_eq!(blank, SearchOutcome::Skipped);
    assert!(api.search_calls.lock().unwrap().is_empty());
    assert_eq!(repo.snapshot().await.items.len(), 3);
}

#[tokio::test]
async fn test_newer_search_supersedes_during_fetches() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    api.add_remote(note(60), Duration::from_secs(5));
    api.set_search("slow", Some(vec![id(60)]));
    api.set_search("fast", Some(vec![id(2)]));
    let repo = notes_repo(api.clone(), 30);
    repo.initial().await;

    let started = Instant::now();
    let (slow, fast) = tokio::join!(repo.search("slow"), async {
        while !api.fetch_calls.lock().unwrap().contains(&id(60)) {
            tokio::task::yield_now().await;
        }
        repo.search("fast").await
    });

    assert_eq!(slow, SearchOutcome::Superseded);
    assert_eq!(fast, SearchOutcome::Applied(1));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ids(&repo.snapshot().await.items), vec![2]);
    assert_eq!(
        *api.search_calls.lock().unwrap(),
        vec!["slow".to_string(), "fast".to_string()]
    );
}

#[tokio::test]
async fn test_reload_cancels_pending_search() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    api.set_search("beach", Some(vec![id(1)]));

    let mut opts = options(30);
    opts.search_debounce = Duration::from_millis(30);
    let repo = ContentRepository::with_options(api.clone(), ContentCategory::Notes, opts);
    repo.initial().await;

    let (outcome, ()) = tokio::join!(repo.search("beach"), repo.reload());

    assert_eq!(outcome, SearchOutcome::Superseded);
    assert!(api.search_calls.lock().unwrap().is_empty());
    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![1, 2, 3]);
    assert!(!snapshot.is_searching);
    assert_eq!(api.page_requests(), vec![0, 0]);
}

#[tokio::test]
async fn test_late_page_is_not_mixed_into_search_results() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(FakeApi {
        list_gate: Some(gate.clone()),
        ..FakeApi::with_catalog(catalog(5))
    });
    api.set_search("one", Some(vec![id(3)]));
    let repo = notes_repo(api.clone(), 30);

    let ((), outcome) = tokio::join!(repo.initial(), async {
        while api.page_requests().is_empty() {
            tokio::task::yield_now().await;
        }
        let outcome = repo.search("one").await;
        gate.notify_one();
        outcome
    });

    assert_eq!(outcome, SearchOutcome::Applied(1));
    let snapshot = repo.snapshot().await;
    assert_eq!(ids(&snapshot.items), vec![3]);
    assert!(snapshot.showing_search_results);
    assert!(!repo.is_loading());
}

#[tokio::test]
async fn test_load_more_waits_for_reload_after_search() {
    let api = Arc::new(FakeApi::with_catalog(catalog(6)));
    api.set_search("two", Some(vec![id(2)]));
    let repo = notes_repo(api.clone(), 2);

    repo.initial().await;
    assert_eq!(repo.search("two").await, SearchOutcome::Applied(1));
    assert!(!repo.load_more().await);
    assert_eq!(ids(&repo.snapshot().await.items), vec![2]);

    repo.reload().await;
    assert!(!repo.snapshot().await.showing_search_results);
    assert!(repo.load_more().await);
    assert_eq!(ids(&repo.snapshot().await.items), vec![1, 2, 3, 4]);
    assert_eq!(api.page_requests(), vec![0, 0, 1]);
}

#[tokio::test]
async fn test_load_of_last_possible_page() {
    let api = Arc::new(FakeApi::with_catalog(catalog(3)));
    let repo = notes_repo(api.clone(), 30);

    assert!(repo.load(u32::MAX, false).await);

    let snapshot = repo.snapshot().await;
    assert!(!snapshot.has_more_data);
    assert!(!snapshot.has_content());
    assert!(!repo.load_more().await);
}
