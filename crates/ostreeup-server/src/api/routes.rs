use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer,
};

use super::{auth::AuthState, done, health, info, queue, state::ApiState};

/// 10 MiB, per spec: the non-upload JSON endpoints reject larger
/// bodies; the upload route has no such cap.
const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// 60 seconds, per spec. Exempted from the upload route, which relies
/// on the client's much longer HTTP timeout instead -- see SPEC_FULL.md
/// section 5.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Assembles the full Wire Layer router: a `with_state` router with
/// compression and panic-recovery layers wrapped around it, auth
/// applied to every route except the two public ones.
pub fn build_router(state: ApiState, auth: AuthState) -> Router {
    let timed = Router::new()
        .route("/info", get(info::handler))
        .route("/queue", post(queue::create))
        .route("/queue/{id}", get(queue::missing).delete(queue::delete))
        .route("/done/{id}", get(done::handler))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    let untimed =
        Router::new().route("/queue/{id}", put(queue::upload)).layer(DefaultBodyLimit::disable());

    let api = timed.merge(untimed).with_state(state.clone()).layer(from_fn_with_state(
        auth,
        super::auth::auth_layer,
    ));

    let public = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::handler))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .merge(public)
        .layer(CompressionLayer::new().gzip(true).deflate(true).br(true).zstd(true))
        .layer(CatchPanicLayer::custom(super::error::handle_panic))
}

/// End-to-end tests that drive the router the way a real publish client
/// would, one HTTP call at a time.
#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use axum_test::TestServer;
    use ostreeup_core::{
        checksum::sha256_bytes,
        repo_mode::RepoMode,
        store::StoreAdapter,
        testutil::TestRepo,
        wire::{QueueCreateRequest, QueueCreateResponse, QueueObjectsResponse},
        ObjectName, RevisionPair,
    };

    use super::*;
    use crate::{config::TokenStore, queue::QueueEngine, staging::StagingEngine};

    const TOKEN: &str = "test-token";

    /// A fresh server backed by its own temporary repository, and a
    /// second "source" repository that plays the role of the client's
    /// local checkout -- object bytes are read from it and uploaded to
    /// the server over HTTP, exactly as `ostreeup-client::push` does.
    fn harness() -> (TestRepo, TestServer) {
        let repo = TestRepo::new(RepoMode::Bare);
        let store: Arc<dyn StoreAdapter + Send + Sync> = Arc::new(repo.adapter());
        let state = ApiState::new(
            store,
            Arc::new(QueueEngine::new()),
            Arc::new(StagingEngine::open(repo.path()).unwrap()),
        );
        let auth = AuthState::new(Arc::new(TokenStore::from_raw_tokens([TOKEN.to_string()])));
        let server = TestServer::new(build_router(state, auth)).unwrap();
        (repo, server)
    }

    /// Hand-rolled multipart body for a single `file` + `checksum` part
    /// pair, the same shape `ostreeup-client::multipart` builds.
    fn multipart_body(name: ObjectName, bytes: &[u8]) -> (Vec<u8>, String) {
        const BOUNDARY: &str = "ostreeup-test-boundary";
        let digest = hex::encode(sha256_bytes(bytes));
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"checksum\"\r\n\r\n");
        body.extend_from_slice(format!("{name}:{digest}").as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (body, format!("multipart/form-data; boundary={BOUNDARY}"))
    }

    async fn upload_all(
        server: &TestServer,
        id: &str,
        source: &TestRepo,
        objects: &BTreeSet<ObjectName>,
    ) {
        let adapter = source.adapter();
        for name in objects {
            let bytes = std::fs::read(adapter.object_path(name)).unwrap();
            let (body, content_type) = multipart_body(*name, &bytes);
            let resp = server
                .put(&format!("/api/v1/queue/{id}"))
                .authorization_bearer(TOKEN)
                .content_type(&content_type)
                .bytes(body.into())
                .await;
            resp.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected() {
        let (_repo, server) = harness();
        let resp = server.get("/api/v1/info").await;
        resp.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_and_ping_need_no_token() {
        let (_repo, server) = harness();
        server.get("/health").await.assert_status_ok();
        server.get("/ping").await.assert_status_ok();
    }

    #[tokio::test]
    async fn fresh_branch_push_end_to_end() {
        let (_repo, server) = harness();
        let source = TestRepo::new(RepoMode::Bare);
        let (adapter, commit) = source.commit_with_files(&[("a.txt", b"hello")]);
        let closure = adapter.traverse_commit(commit, 0).unwrap();

        let info = server
            .get("/api/v1/info")
            .authorization_bearer(TOKEN)
            .await
            .json::<ostreeup_core::wire::InfoResponse>();
        assert!(info.revs.is_empty());

        let mut refs = std::collections::BTreeMap::new();
        refs.insert("stable".to_string(), RevisionPair { server: None, client: commit });
        let request = QueueCreateRequest { refs, objects: closure.iter().copied().collect() };

        let created = server
            .post("/api/v1/queue")
            .authorization_bearer(TOKEN)
            .json(&request)
            .await
            .json::<QueueCreateResponse>();

        let missing = server
            .get(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .json::<QueueObjectsResponse>();
        assert_eq!(missing.objects.len(), closure.len());

        upload_all(&server, &created.id, &source, &closure).await;

        let missing = server
            .get(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .json::<QueueObjectsResponse>();
        assert!(missing.objects.is_empty());

        server
            .get(&format!("/api/v1/done/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .assert_status_ok();

        let info = server
            .get("/api/v1/info")
            .authorization_bearer(TOKEN)
            .await
            .json::<ostreeup_core::wire::InfoResponse>();
        assert_eq!(info.revs["stable"], commit);

        // the queue entry is gone once finalize succeeds.
        server
            .get(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn second_create_for_same_branch_conflicts() {
        let (_repo, server) = harness();
        let source = TestRepo::new(RepoMode::Bare);
        let (_adapter, commit) = source.commit_with_files(&[("a.txt", b"hello")]);

        let mut refs = std::collections::BTreeMap::new();
        refs.insert("stable".to_string(), RevisionPair { server: None, client: commit });
        let request = QueueCreateRequest { refs, objects: Vec::new() };

        server.post("/api/v1/queue").authorization_bearer(TOKEN).json(&request).await.assert_status_ok();

        let conflict = server.post("/api/v1/queue").authorization_bearer(TOKEN).json(&request).await;
        conflict.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = conflict.json::<ostreeup_core::wire::ErrorResponse>();
        assert!(body.error.contains("branch \"stable\" is already being updated"));
    }

    #[tokio::test]
    async fn abort_releases_the_branch_for_reuse() {
        let (_repo, server) = harness();
        let source = TestRepo::new(RepoMode::Bare);
        let (_adapter, commit) = source.commit_with_files(&[("a.txt", b"hello")]);

        let mut refs = std::collections::BTreeMap::new();
        refs.insert("stable".to_string(), RevisionPair { server: None, client: commit });
        let request = QueueCreateRequest { refs: refs.clone(), objects: Vec::new() };

        let created = server
            .post("/api/v1/queue")
            .authorization_bearer(TOKEN)
            .json(&request)
            .await
            .json::<QueueCreateResponse>();

        server
            .delete(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .assert_status_ok();

        // the branch is free again, and deleting an already-gone id is a no-op.
        server.post("/api/v1/queue").authorization_bearer(TOKEN).json(&request).await.assert_status_ok();
        server
            .delete(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn bad_checksum_is_rejected_mid_upload() {
        let (_repo, server) = harness();
        let source = TestRepo::new(RepoMode::Bare);
        let (adapter, commit) = source.commit_with_files(&[("a.txt", b"hello")]);
        let closure = adapter.traverse_commit(commit, 0).unwrap();
        let name = *closure.iter().next().unwrap();
        let bytes = std::fs::read(adapter.object_path(&name)).unwrap();

        let mut refs = std::collections::BTreeMap::new();
        refs.insert("stable".to_string(), RevisionPair { server: None, client: commit });
        let request =
            QueueCreateRequest { refs, objects: closure.iter().copied().collect() };
        let created = server
            .post("/api/v1/queue")
            .authorization_bearer(TOKEN)
            .json(&request)
            .await
            .json::<QueueCreateResponse>();

        let (body, content_type) = multipart_body(name, &bytes);
        // the checksum part declares a digest that does not match the
        // bytes just staged.
        let wrong_digest = "0".repeat(64);
        let body = String::from_utf8(body)
            .unwrap()
            .replacen(&hex::encode(sha256_bytes(&bytes)), &wrong_digest, 1)
            .into_bytes();

        let resp = server
            .put(&format!("/api/v1/queue/{}", created.id))
            .authorization_bearer(TOKEN)
            .content_type(&content_type)
            .bytes(body.into())
            .await;
        resp.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
