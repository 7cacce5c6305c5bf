//! End-to-end scenarios for the sync service against scripted
//! collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{watch, Notify};
use url::Url;

use pokedex_sync::{
    EntryStore, JsonShape, MemoryEntryStore, StoreError, SyncConfig, SyncError, SyncService,
    SyncState, Transport, TransportError,
};

/// One scripted transport response.
enum Reply {
    Body(Vec<u8>),
    ConnectionError,
    /// Like `Body`, but the request does not complete until the gate is
    /// released.
    GatedBody(Vec<u8>, Arc<Notify>),
}

/// Transport returning scripted replies in request order and recording
/// every requested URL.
#[derive(Clone, Default)]
struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<Url>>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(url.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted request");

        match reply {
            Reply::Body(body) => Ok(body),
            Reply::ConnectionError => Err(TransportError::Request(Box::new(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ))),
            Reply::GatedBody(body, gate) => {
                gate.notified().await;
                Ok(body)
            }
        }
    }
}

fn test_config() -> SyncConfig {
    SyncConfig::new()
        .with_base_url(Url::parse("http://collection.test/pokemon").unwrap())
        .with_page_limit(3)
}

fn collection_body(records: &[(&str, &str)]) -> Vec<u8> {
    let results: Vec<_> = records
        .iter()
        .map(|(name, url)| json!({"name": name, "url": url}))
        .collect();
    serde_json::to_vec(&json!({"count": results.len(), "results": results})).unwrap()
}

/// Drive the subscription until the current state is terminal.
async fn wait_until_terminal(state: &mut watch::Receiver<SyncState>) -> SyncState {
    loop {
        let current = state.borrow_and_update().clone();
        if !current.is_loading() {
            return current;
        }
        state.changed().await.expect("sync service dropped");
    }
}

/// Wait out the next transition, then drive to the following terminal
/// state. Used after a retry, when the current value is already terminal.
async fn wait_for_next_terminal(state: &mut watch::Receiver<SyncState>) -> SyncState {
    state.changed().await.expect("sync service dropped");
    wait_until_terminal(state).await
}

#[tokio::test]
async fn construction_starts_loading_with_no_error() {
    let transport = ScriptedTransport::new();
    let gate = Arc::new(Notify::new());
    transport.push(Reply::GatedBody(collection_body(&[]), gate.clone()));

    let service = SyncService::spawn(test_config(), transport, MemoryEntryStore::new());

    let state = service.state();
    assert!(state.is_loading());
    assert!(state.last_error().is_none());
    assert!(state.retry_handle().is_none());

    gate.notify_one();
}

#[tokio::test]
async fn a_successful_fetch_imports_and_publishes_ready() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Body(collection_body(&[(
        "bulbasaur",
        "https://pokeapi.co/api/v2/pokemon/1/",
    )])));

    let store = Arc::new(MemoryEntryStore::new());
    let service = SyncService::spawn(test_config(), transport.clone(), store.clone());

    let mut state = service.subscribe();
    let terminal = wait_until_terminal(&mut state).await;

    assert!(matches!(terminal, SyncState::Ready));
    assert!(terminal.last_error().is_none());

    let entries = store.list_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "bulbasaur");
    assert_eq!(entries[0].position, 0);

    assert_eq!(transport.request_count(), 1);
    assert_eq!(
        transport.requests()[0].as_str(),
        "http://collection.test/pokemon?limit=3&offset=0"
    );
}

#[tokio::test]
async fn a_wrong_shape_payload_fails_with_a_parse_error() {
    let transport = ScriptedTransport::new();
    let wrong_shape = serde_json::to_vec(&json!({"results": "not-a-list"})).unwrap();
    transport.push(Reply::Body(wrong_shape.clone()));
    transport.push(Reply::Body(wrong_shape));

    let service = SyncService::spawn(test_config(), transport.clone(), MemoryEntryStore::new());

    let mut state = service.subscribe();
    let failed = wait_until_terminal(&mut state).await;

    match failed.last_error().expect("failed state carries the error") {
        SyncError::Parse(decode) => {
            assert_eq!(decode.expected, JsonShape::ObjectArray);
            assert_eq!(decode.actual, JsonShape::String);
        }
        other => panic!("expected a parse error, got {other}"),
    }

    // Retrying re-enters the pipeline from scratch and maps the identical
    // failure identically.
    failed.retry_handle().expect("failed state carries retry").retry();
    let failed_again = wait_for_next_terminal(&mut state).await;

    assert_eq!(transport.request_count(), 2);
    assert!(matches!(
        failed_again.last_error(),
        Some(SyncError::Parse(_))
    ));
    assert!(!failed_again.is_loading());
}

#[tokio::test]
async fn a_connection_error_fails_with_a_network_error() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::ConnectionError);

    let service = SyncService::spawn(test_config(), transport, MemoryEntryStore::new());

    let mut state = service.subscribe();
    let failed = wait_until_terminal(&mut state).await;

    assert!(matches!(failed.last_error(), Some(SyncError::Network(_))));
    assert!(failed.retry_handle().is_some());
}

#[tokio::test]
async fn an_importer_rejection_fails_with_a_save_error() {
    let transport = ScriptedTransport::new();
    // Decodes fine, but the record has no usable identity field.
    transport.push(Reply::Body(
        serde_json::to_vec(&json!({"results": [{"url": "u1"}]})).unwrap(),
    ));

    let store = Arc::new(MemoryEntryStore::new());
    let service = SyncService::spawn(test_config(), transport, store.clone());

    let mut state = service.subscribe();
    let failed = wait_until_terminal(&mut state).await;

    match failed.last_error().expect("failed state carries the error") {
        SyncError::Save(StoreError::InvalidRecord { index, .. }) => assert_eq!(*index, 0),
        other => panic!("expected a save error, got {other}"),
    }
    assert_eq!(store.entry_count().await.unwrap(), 0);
}

#[tokio::test]
async fn a_second_fetch_supersedes_an_in_flight_one() {
    let transport = ScriptedTransport::new();
    let gate = Arc::new(Notify::new());
    transport.push(Reply::GatedBody(
        collection_body(&[("bulbasaur", "u1")]),
        gate.clone(),
    ));
    transport.push(Reply::Body(collection_body(&[("ivysaur", "u2")])));

    let store = Arc::new(MemoryEntryStore::new());
    let service = SyncService::spawn(test_config(), transport.clone(), store.clone());

    // Wait until the first request is actually in flight before starting
    // the second fetch.
    while transport.request_count() == 0 {
        tokio::task::yield_now().await;
    }
    service.fetch_collection();

    let mut state = service.subscribe();
    let terminal = wait_until_terminal(&mut state).await;
    assert!(matches!(terminal, SyncState::Ready));
    assert_eq!(transport.request_count(), 2);

    // The superseded fetch never finished its pipeline, so only the newer
    // batch is in the store.
    let names: Vec<_> = store
        .list_entries()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, ["ivysaur"]);

    // Releasing the stale request must not overwrite the published state.
    gate.notify_one();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(matches!(service.state(), SyncState::Ready));
}

#[tokio::test]
async fn entry_detail_fetches_are_isolated_per_record() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Body(collection_body(&[
        ("bulbasaur", "http://records.test/1"),
        ("ivysaur", "http://records.test/2"),
    ])));
    transport.push(Reply::Body(b"detail".to_vec()));
    transport.push(Reply::Body(b"detail".to_vec()));

    let store = Arc::new(MemoryEntryStore::new());
    let service = SyncService::spawn(test_config(), transport.clone(), store.clone());

    let mut state = service.subscribe();
    wait_until_terminal(&mut state).await;

    let entries = store.list_entries().await.unwrap();
    service.fetch_entry_details(&entries[0]);
    service.fetch_entry_details(&entries[1]);

    // Both requests go out; neither cancels the other.
    while transport.request_count() < 3 {
        tokio::task::yield_now().await;
    }
    let requested: Vec<_> = transport
        .requests()
        .into_iter()
        .map(|url| url.to_string())
        .collect();
    assert!(requested.contains(&"http://records.test/1".to_string()));
    assert!(requested.contains(&"http://records.test/2".to_string()));

    // Refetching one record supersedes only its own in-flight request.
    let gate = Arc::new(Notify::new());
    transport.push(Reply::GatedBody(b"detail".to_vec(), gate.clone()));
    transport.push(Reply::Body(b"detail".to_vec()));

    service.fetch_entry_details(&entries[0]);
    while transport.request_count() < 4 {
        tokio::task::yield_now().await;
    }
    service.fetch_entry_details(&entries[0]);
    while transport.request_count() < 5 {
        tokio::task::yield_now().await;
    }

    // Detail fetches publish nothing either way.
    assert!(matches!(service.state(), SyncState::Ready));
    gate.notify_one();
}

#[tokio::test]
async fn retry_after_shutdown_is_a_noop() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::ConnectionError);
    transport.push(Reply::ConnectionError);

    let service = SyncService::spawn(test_config(), transport, MemoryEntryStore::new());

    let mut state = service.subscribe();
    let failed = wait_until_terminal(&mut state).await;
    let retry = failed.retry_handle().expect("failed state carries retry").clone();

    drop(service);

    // The handle holds no live reference to the service; invoking it after
    // shutdown must do nothing.
    retry.retry();
    retry.retry();
}
