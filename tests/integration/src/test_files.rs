//! Upload, download, and capability URL integration tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{API_KEY, TestServer, WAREHOUSE};

    fn capability_request(server: &TestServer, filename: &str, ttl: i64) -> reqwest::RequestBuilder {
        server
            .client
            .post(server.url("/api/signed-url"))
            .header("x-api-key", API_KEY)
            .json(&serde_json::json!({
                "warehouseId": WAREHOUSE,
                "filename": filename,
                "expiresIn": ttl,
            }))
    }

    #[tokio::test]
    async fn test_should_upload_and_download_with_api_key() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("manifest.csv", b"sku,qty\n1,2\n").await;
        let url = file["url"].as_str().expect("url");

        let resp = server
            .client
            .get(server.url(url))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-disposition"],
            "inline; filename=\"manifest.csv\""
        );
        assert_eq!(resp.headers()["content-length"], "12");
        assert_eq!(resp.bytes().await.expect("body").as_ref(), b"sku,qty\n1,2\n");
    }

    #[tokio::test]
    async fn test_should_upload_several_files_at_once() {
        let server = TestServer::start(true).await;
        let resp = server
            .upload(API_KEY, WAREHOUSE, &[("a.txt", b"a"), ("b.txt", b"bb")])
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert_eq!(json["files"][1]["size"], 2);
    }

    #[tokio::test]
    async fn test_should_round_trip_capability_url_without_credentials() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("photo.png", b"\x89PNG").await;
        let filename = file["filename"].as_str().expect("filename");

        let resp = capability_request(&server, filename, 300)
            .send()
            .await
            .expect("issue");
        assert_eq!(resp.status(), StatusCode::OK);
        let issued: serde_json::Value = resp.json().await.expect("json");
        let url = issued["capabilityUrl"].as_str().expect("capabilityUrl");
        assert!(url.starts_with(&format!("/api/files/{WAREHOUSE}/")));
        assert!(url.contains("expires=") && url.contains("&signature="));

        let resp = server
            .client
            .get(server.url(url))
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.bytes().await.expect("body").as_ref(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_should_reject_tampered_capability() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("a.txt", b"a").await;
        let filename = file["filename"].as_str().expect("filename");
        let issued: serde_json::Value = capability_request(&server, filename, 300)
            .send()
            .await
            .expect("issue")
            .json()
            .await
            .expect("json");
        let url = issued["capabilityUrl"].as_str().expect("url");

        let (path, query) = url.split_once('?').expect("query");
        let expires: i64 = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("expires="))
            .and_then(|v| v.parse().ok())
            .expect("expires");
        let signature = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("signature="))
            .expect("signature");
        let tampered = format!("{path}?expires={}&signature={signature}", expires + 1);

        let resp = server
            .client
            .get(server.url(&tampered))
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["error"], "Invalid or expired signature");
    }

    #[tokio::test]
    async fn test_should_gate_unverified_files_until_admin_verifies() {
        let server = TestServer::start(false).await;
        let file = server.upload_one("draft.pdf", b"%PDF").await;
        let url = file["url"].as_str().expect("url");
        let file_id = file["fileId"].as_str().expect("fileId");

        let resp = server
            .client
            .get(server.url(url))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["error"], "File not verified");

        // A capability still works for unverified files.
        let filename = file["filename"].as_str().expect("filename");
        let issued: serde_json::Value = capability_request(&server, filename, 60)
            .send()
            .await
            .expect("issue")
            .json()
            .await
            .expect("json");
        let signed = issued["signedUrl"].as_str().expect("signedUrl");
        let resp = server
            .client
            .get(server.url(signed))
            .send()
            .await
            .expect("signed download");
        assert_eq!(resp.status(), StatusCode::OK);

        let cookie = server.login(crate::ADMIN_EMAIL).await;
        let resp = server
            .client
            .post(server.url("/api/admin/verify-file"))
            .header("cookie", &cookie)
            .json(&serde_json::json!({"fileId": file_id, "isVerified": true}))
            .send()
            .await
            .expect("verify");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = server
            .client
            .get(server.url(url))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_enforce_warehouse_entitlement_for_sessions() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("a.txt", b"a").await;
        let url = file["url"].as_str().expect("url");

        let alice = server.login(crate::USER_EMAIL).await;
        let resp = server
            .client
            .get(server.url(url))
            .header("cookie", &alice)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::OK);

        let mallory = server.login(crate::OUTSIDER_EMAIL).await;
        let resp = server
            .client
            .get(server.url(url))
            .header("cookie", &mallory)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = server
            .client
            .get(server.url(url))
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_list_and_delete_files() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("stock.csv", b"1").await;
        let file_id = file["fileId"].as_str().expect("fileId");
        let url = file["url"].as_str().expect("url");

        let alice = server.login(crate::USER_EMAIL).await;
        let listed: serde_json::Value = server
            .client
            .get(server.url("/api/user/files"))
            .header("cookie", &alice)
            .send()
            .await
            .expect("list")
            .json()
            .await
            .expect("json");
        assert_eq!(listed["files"][0]["id"], file_id);

        let mallory = server.login(crate::OUTSIDER_EMAIL).await;
        let listed: serde_json::Value = server
            .client
            .get(server.url("/api/user/files"))
            .header("cookie", &mallory)
            .send()
            .await
            .expect("list")
            .json()
            .await
            .expect("json");
        assert_eq!(listed["files"], serde_json::json!([]));

        let resp = server
            .client
            .get(server.url("/api/admin/list-files"))
            .header("cookie", &alice)
            .send()
            .await
            .expect("admin list");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        // Uploaded with the API key, so only an admin may remove it.
        let resp = server
            .client
            .delete(server.url(&format!("/api/user/files/{file_id}")))
            .header("cookie", &alice)
            .send()
            .await
            .expect("delete");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin = server.login(crate::ADMIN_EMAIL).await;
        let resp = server
            .client
            .delete(server.url(&format!("/api/user/files/{file_id}")))
            .header("cookie", &admin)
            .send()
            .await
            .expect("delete");
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = server
            .client
            .get(server.url(url))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .expect("download");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(server.provider.store().file_count(), 0);
    }

    #[tokio::test]
    async fn test_should_persist_uploads_in_metadata_snapshot() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("a.txt", b"a").await;
        let file_id = file["fileId"].as_str().expect("fileId");

        let record = server
            .provider
            .store()
            .find_file_by_id(file_id)
            .expect("record");
        assert!(record.is_verified);
        assert_eq!(record.verified_by.as_deref(), Some("system"));
        assert_eq!(server.provider.store().file_count(), 1);
    }
}
