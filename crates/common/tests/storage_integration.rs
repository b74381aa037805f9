//! Integration tests for the session file
//!
//! Verifies that concurrent writers never leave a torn credential blob.

#![cfg(feature = "platform")]

use std::sync::Arc;

use sunga_common::auth::{CredentialStore, Credentials, FileCredentialStore};

/// Validates atomic replacement of the credential blob under contention.
///
/// # Test Steps
/// 1. Spawn writers that each store a distinct, internally consistent
///    triple (`T{n}` / `R{n}`)
/// 2. Read concurrently while they run
/// 3. Every read must return a matching pair, never `T{a}` with `R{b}`
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_never_observe_torn_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path().join("session.json")));
    store.save_credentials(&Credentials::new("T0", "R0", None).unwrap()).await.unwrap();

    let mut handles = Vec::new();
    for n in 1..=20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let creds = Credentials::new(format!("T{n}"), format!("R{n}"), None).unwrap();
            store.save_credentials(&creds).await.unwrap();
        }));
    }
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let creds = store.load_credentials().await.unwrap().expect("credentials present");
            assert_eq!(creds.access_token[1..], creds.refresh_token[1..]);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_remember_me_survives_clear() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("session.json"));

    store.set_remember_me(true).await.unwrap();
    store.save_credentials(&Credentials::new("T1", "R1", None).unwrap()).await.unwrap();
    store.clear().await.unwrap();

    assert!(store.remember_me().await.unwrap());
    assert_eq!(store.load_credentials().await.unwrap(), None);
}
