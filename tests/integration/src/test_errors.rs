//! Routing, error format, and common header integration tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{API_KEY, BOUNDARY, TestServer, WAREHOUSE, multipart_body};

    async fn error_of(resp: reqwest::Response) -> String {
        let json: serde_json::Value = resp.json().await.expect("json error body");
        json["error"].as_str().expect("error field").to_owned()
    }

    #[tokio::test]
    async fn test_should_report_health_with_common_headers() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .get(server.url("/health"))
            .send()
            .await
            .expect("health");
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(resp.headers()["server"], "depot");
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["status"], "running");
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_unknown_file() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .get(server.url("/api/files/w-1/nothing-here.txt"))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_of(resp).await, "File not found");

        let resp = server
            .client
            .get(server.url("/api/elsewhere"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_return_method_not_allowed() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .get(server.url("/api/upload"))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_should_distinguish_upload_credential_failures() {
        let server = TestServer::start(true).await;

        let resp = server
            .client
            .post(server.url("/api/upload"))
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(WAREHOUSE, &[("a.txt", b"a")]))
            .send()
            .await
            .expect("upload");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = server.upload("not-a-key", WAREHOUSE, &[("a.txt", b"a")]).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(error_of(resp).await, "Invalid API key");

        let resp = server.upload(API_KEY, "w-2", &[("a.txt", b"a")]).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            error_of(resp).await,
            "You do not have access to this warehouse"
        );

        let resp = server.upload(API_KEY, WAREHOUSE, &[]).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(resp).await, "No files uploaded");
    }

    #[tokio::test]
    async fn test_should_reject_malformed_json() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .post(server.url("/api/signed-url"))
            .header("x-api-key", API_KEY)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{not json")
            .send()
            .await
            .expect("issue");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(resp).await, "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_should_reject_garbage_signature() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("a.txt", b"a").await;
        let url = format!(
            "{}?expires=99999999999&signature=zz",
            file["url"].as_str().expect("url")
        );
        let resp = server
            .client
            .get(server.url(&url))
            .send()
            .await
            .expect("get");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(error_of(resp).await, "Invalid or expired signature");
    }
}
