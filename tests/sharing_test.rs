//! End-to-end sharing flows and concurrent store access.

use chrono::Duration;
use soubise::{
    errors::StoreError,
    models::{archive::Archive, reference_path::ReferencePath},
    routes::routes::routes,
    services::{
        archive_service::ArchiveService,
        broker::{Broker, InMemoryBroker},
        client::Client,
        crypto::{self, KeyMaterial},
        expiry::ExpiryEngine,
        localfs_storage::LocalFsStorage,
        memory_storage::InMemoryStorage,
        object_store::ObjectStore,
        storage::Storage,
    },
};
use std::sync::Arc;
use tokio::net::TcpListener;

const PLAINTEXT: &[u8] = b"not much how about you";

fn memory_service() -> ArchiveService {
    let backend: Arc<dyn Storage> =
        Arc::new(InMemoryStorage::new(Arc::new(InMemoryBroker::new())));
    ArchiveService::new(
        Arc::new(ObjectStore::with_backend(backend)),
        Arc::new(ExpiryEngine::new()),
    )
}

#[tokio::test]
async fn share_store_resolve_and_decrypt() {
    let service = memory_service();

    let key = KeyMaterial::generate();
    let sealed = crypto::encrypt(PLAINTEXT, &key).unwrap();
    let archive = Archive::with_lifetime("fakeFile_here.txt", sealed, Duration::hours(24)).unwrap();

    let id = service
        .create_archive(archive.to_bytes().unwrap())
        .await
        .unwrap();

    let reference = ReferencePath::new("https://pub.soubise.org", id.clone(), key.to_base64());
    let decoded = ReferencePath::decode(&reference.encode()).unwrap();
    assert_eq!(decoded, reference);

    let fetched = Archive::from_bytes(&service.fetch_archive(&decoded.id).await.unwrap()).unwrap();
    assert_eq!(fetched, archive);

    let key = KeyMaterial::from_base64(&decoded.encryption_key).unwrap();
    assert_eq!(crypto::decrypt(fetched.content(), &key).unwrap(), PLAINTEXT);
}

#[tokio::test]
async fn client_share_and_get_over_http() {
    let service = memory_service();
    let app = routes().with_state(service.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let upload_dir = tempfile::tempdir().unwrap();
    let file = upload_dir.path().join("fakeFile_here.txt");
    std::fs::write(&file, PLAINTEXT).unwrap();

    let client = Client::new().unwrap();
    let receipt = client
        .share(&file, Duration::hours(24), &server)
        .await
        .unwrap();
    assert_eq!(receipt.reference.server, server);
    assert_eq!(receipt.size, PLAINTEXT.len());

    // The server only ever holds ciphertext.
    let stored = service.store.get(&receipt.reference.id).await.unwrap();
    let stored = Archive::from_bytes(&stored).unwrap();
    assert_ne!(stored.content(), PLAINTEXT);

    let download_dir = tempfile::tempdir().unwrap();
    let download = client
        .get(&receipt.reference.to_string(), download_dir.path())
        .await
        .unwrap();
    assert_eq!(download.path, download_dir.path().join("fakeFile_here.txt"));
    assert_eq!(std::fs::read(&download.path).unwrap(), PLAINTEXT);
}

#[tokio::test]
async fn get_with_the_wrong_key_reports_decryption_failure() {
    let service = memory_service();
    let sealed = crypto::encrypt(PLAINTEXT, &KeyMaterial::generate()).unwrap();
    let archive = Archive::with_lifetime("secret.txt", sealed, Duration::hours(1)).unwrap();
    let id = service
        .create_archive(archive.to_bytes().unwrap())
        .await
        .unwrap();

    let fetched = Archive::from_bytes(&service.fetch_archive(&id).await.unwrap()).unwrap();
    let err = crypto::decrypt(fetched.content(), &KeyMaterial::generate()).unwrap_err();
    assert!(matches!(err, StoreError::Crypto(_)));
}

#[tokio::test]
async fn concurrent_creates_are_all_retrievable() {
    let dir = tempfile::tempdir().unwrap();
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let backends: Vec<Arc<dyn Storage>> = vec![
        Arc::new(InMemoryStorage::new(broker.clone())),
        Arc::new(LocalFsStorage::new(broker.clone(), dir.path())),
    ];

    for backend in backends {
        let store = Arc::new(ObjectStore::with_backend(backend));
        let tasks: Vec<_> = (0..32u32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let payload = i.to_be_bytes().to_vec();
                    let id = store.create(payload.clone()).await.unwrap();
                    (id, payload)
                })
            })
            .collect();

        let mut created = Vec::new();
        for task in tasks {
            created.push(task.await.unwrap());
        }

        for (id, payload) in &created {
            assert_eq!(&store.get(id).await.unwrap(), payload);
        }
        assert_eq!(store.ids().await.unwrap().len(), created.len());
    }
}

#[tokio::test]
async fn create_and_delete_on_one_id_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalFsStorage::new(
        Arc::new(InMemoryBroker::new()),
        dir.path(),
    ));
    let id = "q0vPx1bKD-2_aZ9yLr3mNw4T";
    let payload = vec![7u8; 64 * 1024];

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let storage = storage.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    storage.create(id, payload).await.unwrap();
                } else {
                    storage.delete(id).await.unwrap();
                }
                match storage.get(id).await {
                    Ok(bytes) => assert_eq!(bytes.len(), 64 * 1024),
                    Err(err) => assert!(err.is_not_found(), "{err}"),
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
}
