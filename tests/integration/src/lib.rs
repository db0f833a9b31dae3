//! Integration tests for the Depot server.
//!
//! Each test starts the real hyper service in-process on `127.0.0.1:0` with a
//! fresh temporary data directory, then drives it over HTTP with `reqwest`.
//!
//! ```text
//! cargo test -p depot-integration
//! ```

use std::sync::{Arc, Once};

use depot_auth::password::hash_password;
use depot_core::{ApiKeyRecord, Clock, DepotConfig, Role, SystemClock, UserRecord, Warehouse};
use depot_http::{DepotHttpConfig, DepotHttpService, DepotProvider};
use depot_store::MetadataStore;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// API key entitled to [`WAREHOUSE`].
pub const API_KEY: &str = "wk_integration_key_0001";
/// The seeded warehouse.
pub const WAREHOUSE: &str = "w-1";
/// Password shared by every seeded user.
pub const PASSWORD: &str = "correct horse";
/// Seeded admin login.
pub const ADMIN_EMAIL: &str = "admin@example.com";
/// Seeded user entitled to [`WAREHOUSE`].
pub const USER_EMAIL: &str = "alice@example.com";
/// Seeded user with no entitlements.
pub const OUTSIDER_EMAIL: &str = "mallory@example.com";
/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "depot-test-boundary";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A running server and its scratch directory.
#[derive(Debug)]
pub struct TestServer {
    /// `http://127.0.0.1:<port>`.
    pub base_url: String,
    /// The handler behind the server, for direct store access.
    pub provider: DepotProvider,
    /// HTTP client.
    pub client: reqwest::Client,
    task: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    /// Start a server; uploads are auto-verified when `auto_verify` is set.
    pub async fn start(auto_verify: bool) -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("tempdir");
        let config = DepotConfig::builder()
            .gateway_listen("127.0.0.1:0".to_owned())
            .hmac_secret("integration-hmac-secret".to_owned())
            .session_secret("integration-session-secret".to_owned())
            .data_dir(dir.path().join("storage"))
            .uploads_dir(dir.path().join("uploads"))
            .auto_verify_uploads(auto_verify)
            .build();

        let store = MetadataStore::open(config.metadata_path())
            .await
            .expect("open metadata");
        seed(&store).await;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let http_config = DepotHttpConfig::from(&config);
        let provider = DepotProvider::new(config, Arc::new(store), Arc::clone(&clock));
        let service = DepotHttpService::new(provider.clone(), http_config, clock);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(accept_loop(listener, service));

        Self {
            base_url: format!("http://{addr}"),
            provider,
            client: reqwest::Client::new(),
            task,
            _dir: dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Log in and return the `session=<token>` cookie pair.
    pub async fn login(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "login failed");
        resp.headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("session cookie")
            .to_owned()
    }

    /// Upload `files` to `warehouse` with `api_key`, returning the raw response.
    pub async fn upload(
        &self,
        api_key: &str,
        warehouse: &str,
        files: &[(&str, &[u8])],
    ) -> reqwest::Response {
        self.client
            .post(self.url("/api/upload"))
            .header("x-api-key", api_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(warehouse, files))
            .send()
            .await
            .expect("upload request")
    }

    /// Upload one file with [`API_KEY`] and return its entry from `files`.
    pub async fn upload_one(&self, name: &str, data: &[u8]) -> serde_json::Value {
        let resp = self.upload(API_KEY, WAREHOUSE, &[(name, data)]).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "upload failed");
        let json: serde_json::Value = resp.json().await.expect("upload json");
        json["files"][0].clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, service: DepotHttpService<DepotProvider>) {
    let http = HttpConnBuilder::new(TokioExecutor::new());
    loop {
        let Ok((stream, peer_addr)) = listener.accept().await else {
            continue;
        };
        let conn = http
            .serve_connection(TokioIo::new(stream), service.with_peer(peer_addr))
            .into_owned();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

async fn seed(store: &MetadataStore) {
    let user = |id: &str, email: &str, role: Role, warehouses: &[&str]| UserRecord {
        id: id.to_owned(),
        email: email.to_owned(),
        password_hash: hash_password(PASSWORD, &format!("salt-{id}")),
        role,
        warehouse_ids: warehouses.iter().map(|w| (*w).to_owned()).collect(),
        name: None,
        created_at: None,
    };

    store
        .upsert_warehouse(Warehouse {
            id: WAREHOUSE.to_owned(),
            name: "Main".to_owned(),
            notes: None,
            created_at: "2024-01-01T00:00:00Z".to_owned(),
        })
        .await
        .expect("seed warehouse");
    for record in [
        user("u-admin", ADMIN_EMAIL, Role::Admin, &[]),
        user("u-alice", USER_EMAIL, Role::User, &[WAREHOUSE]),
        user("u-mallory", OUTSIDER_EMAIL, Role::User, &[]),
    ] {
        store.upsert_user(record).await.expect("seed user");
    }
    store
        .upsert_api_key(ApiKeyRecord {
            key: API_KEY.to_owned(),
            warehouse_id: WAREHOUSE.to_owned(),
            created_at: "2024-01-01T00:00:00Z".to_owned(),
            last_used: None,
        })
        .await
        .expect("seed api key");
}

/// Build a `multipart/form-data` body delimited by [`BOUNDARY`].
#[must_use]
pub fn multipart_body(warehouse: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"warehouseId\"\r\n\r\n{warehouse}\r\n"
        )
        .as_bytes(),
    );
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

mod test_auth;
mod test_errors;
mod test_files;
