//! Session and administrative endpoint integration tests.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{ADMIN_EMAIL, PASSWORD, TestServer, USER_EMAIL};

    #[tokio::test]
    async fn test_should_login_read_me_and_logout() {
        let server = TestServer::start(true).await;

        let resp = server
            .client
            .post(server.url("/api/auth/login"))
            .json(&serde_json::json!({"email": USER_EMAIL, "password": PASSWORD}))
            .send()
            .await
            .expect("login");
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp.headers()["set-cookie"]
            .to_str()
            .expect("cookie")
            .to_owned();
        assert!(set_cookie.starts_with("session="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        let user: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(user["email"], USER_EMAIL);
        assert_eq!(user["role"], "user");
        assert!(user.get("passwordHash").is_none());

        let cookie = set_cookie.split(';').next().expect("pair");
        let me: serde_json::Value = server
            .client
            .get(server.url("/api/auth/me"))
            .header("cookie", cookie)
            .send()
            .await
            .expect("me")
            .json()
            .await
            .expect("json");
        assert_eq!(me["id"], "u-alice");
        assert_eq!(me["warehouseIds"], serde_json::json!(["w-1"]));

        let resp = server
            .client
            .post(server.url("/api/auth/logout"))
            .header("cookie", cookie)
            .send()
            .await
            .expect("logout");
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()["set-cookie"]
                .to_str()
                .expect("cookie")
                .contains("Max-Age=0")
        );
    }

    #[tokio::test]
    async fn test_should_reject_wrong_password() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .post(server.url("/api/auth/login"))
            .json(&serde_json::json!({"email": ADMIN_EMAIL, "password": "nope"}))
            .send()
            .await
            .expect("login");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get("set-cookie").is_none());
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_should_reject_forged_session_cookie() {
        let server = TestServer::start(true).await;
        let resp = server
            .client
            .get(server.url("/api/auth/me"))
            .header("cookie", "session=eyJzdWIiOiJ1LWFkbWluIn0.deadbeef")
            .send()
            .await
            .expect("me");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_restrict_verify_file_to_admins() {
        let server = TestServer::start(false).await;
        let file = server.upload_one("a.txt", b"a").await;
        let body = serde_json::json!({"fileId": file["fileId"], "isVerified": true});

        let resp = server
            .client
            .post(server.url("/api/admin/verify-file"))
            .json(&body)
            .send()
            .await
            .expect("verify");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let alice = server.login(USER_EMAIL).await;
        let resp = server
            .client
            .post(server.url("/api/admin/verify-file"))
            .header("cookie", &alice)
            .json(&body)
            .send()
            .await
            .expect("verify");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin = server.login(ADMIN_EMAIL).await;
        let resp = server
            .client
            .post(server.url("/api/admin/verify-file"))
            .header("cookie", &admin)
            .json(&serde_json::json!({"fileId": "f-missing", "isVerified": true}))
            .send()
            .await
            .expect("verify");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = server
            .client
            .post(server.url("/api/admin/verify-file"))
            .header("cookie", &admin)
            .json(&body)
            .send()
            .await
            .expect("verify");
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(json["file"]["isVerified"], true);
        assert_eq!(json["file"]["verifiedBy"], "u-admin");
    }

    #[tokio::test]
    async fn test_should_refuse_capability_for_other_warehouses() {
        let server = TestServer::start(true).await;
        let file = server.upload_one("a.txt", b"a").await;
        let body = serde_json::json!({
            "warehouseId": "w-1",
            "filename": file["filename"],
        });

        let mallory = server.login(crate::OUTSIDER_EMAIL).await;
        let resp = server
            .client
            .post(server.url("/api/signed-url"))
            .header("cookie", &mallory)
            .json(&body)
            .send()
            .await
            .expect("issue");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin = server.login(ADMIN_EMAIL).await;
        let resp = server
            .client
            .post(server.url("/api/signed-url"))
            .header("cookie", &admin)
            .json(&body)
            .send()
            .await
            .expect("issue");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
