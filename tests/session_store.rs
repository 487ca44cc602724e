// Session persistence through the file-backed key-value store.
use std::fs;
use std::sync::Arc;
use storyapp::context::{AppContext, TestContext};
use storyapp::session::{SessionStore, TOKEN_KEY, USER_ID_KEY};
use storyapp::storage::{FileKeyValueStore, KeyValueStore};

fn open(ctx: &TestContext) -> SessionStore {
    let path = ctx.get_session_path().unwrap();
    SessionStore::open(Arc::new(FileKeyValueStore::new(path))).unwrap()
}

#[tokio::test]
async fn test_first_launch_is_logged_out() {
    let ctx = TestContext::new();
    let store = open(&ctx);
    let session = store.current();
    assert!(!session.is_logged_in());
    assert_eq!(session.token, None);
    assert_eq!(session.user_id, None);
    assert_eq!(session.user_name, None);
}

#[tokio::test]
async fn test_session_survives_reopen() {
    let ctx = TestContext::new();
    {
        let store = open(&ctx);
        store
            .save_session("tok-abc", "user-42", "Fauzan")
            .await
            .unwrap();
    }

    let store = open(&ctx);
    assert!(store.is_logged_in());
    assert_eq!(store.token().await.as_deref(), Some("tok-abc"));
    assert_eq!(store.user_id().await.as_deref(), Some("user-42"));
    assert_eq!(store.user_name().await.as_deref(), Some("Fauzan"));

    // Written under the documented keys.
    let raw = FileKeyValueStore::new(ctx.get_session_path().unwrap());
    assert_eq!(raw.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-abc"));
    assert_eq!(raw.get(USER_ID_KEY).unwrap().as_deref(), Some("user-42"));

    store.clear().await.unwrap();
    let store = open(&ctx);
    assert!(!store.is_logged_in());
    assert_eq!(store.user_name().await, None);
}

#[tokio::test]
async fn test_corrupt_session_file_reads_as_logged_out() {
    let ctx = TestContext::new();
    fs::write(ctx.get_session_path().unwrap(), "{ not json").unwrap();

    let store = open(&ctx);
    assert!(!store.is_logged_in());

    // The next write replaces the broken file.
    store.save_session("tok", "u", "n").await.unwrap();
    assert!(open(&ctx).is_logged_in());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_never_mix_fields() {
    let ctx = TestContext::new();
    let store = Arc::new(open(&ctx));

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let tag = format!("{}", i);
            store
                .save_session(&format!("tok-{}", tag), &format!("user-{}", tag), &format!("name-{}", tag))
                .await
                .unwrap();
        }));
    }

    let mut watcher = store.subscribe();
    let checker = tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let s = watcher.borrow_and_update().clone();
            if let (Some(t), Some(u), Some(n)) = (s.token, s.user_id, s.user_name) {
                let tag = t.trim_start_matches("tok-").to_string();
                assert_eq!(u, format!("user-{}", tag));
                assert_eq!(n, format!("name-{}", tag));
            }
        }
    });

    for h in handles {
        h.await.unwrap();
    }

    let finished = store.current();
    let tag = finished.token.as_deref().unwrap().trim_start_matches("tok-").to_string();
    assert_eq!(finished.user_id, Some(format!("user-{}", tag)));
    assert_eq!(finished.user_name, Some(format!("name-{}", tag)));

    // The persisted copy matches what readers saw last.
    let reopened = open(&ctx).current();
    assert_eq!(reopened, finished);

    drop(store);
    checker.await.unwrap();
}
