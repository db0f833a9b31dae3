//! First-run superadmin account.

use anyhow::{Context, Result};
use depot_auth::password::{generate_salt, hash_password};
use depot_core::{Directory, Role, UserRecord};
use depot_store::MetadataStore;
use tracing::info;

/// Create a superadmin for `email` unless a user with that email exists.
///
/// Returns `true` when an account was created.
pub async fn ensure_admin(
    store: &MetadataStore,
    email: &str,
    password: &str,
    created_at: &str,
) -> Result<bool> {
    if store.find_user_by_email(email).is_some() {
        return Ok(false);
    }

    let user = UserRecord {
        id: format!("u-{}", uuid::Uuid::new_v4().simple()),
        email: email.to_owned(),
        password_hash: hash_password(password, &generate_salt()),
        role: Role::Superadmin,
        warehouse_ids: Vec::new(),
        name: Some("Administrator".to_owned()),
        created_at: Some(created_at.to_owned()),
    };
    let id = user.id.clone();
    store
        .upsert_user(user)
        .await
        .context("failed to store bootstrap admin")?;
    info!(user_id = %id, "created bootstrap superadmin");
    Ok(true)
}

/// Read `DEPOT_ADMIN_EMAIL` and `DEPOT_ADMIN_PASSWORD`, both required.
pub fn admin_from_env() -> Option<(String, String)> {
    let email = std::env::var("DEPOT_ADMIN_EMAIL").ok()?;
    let password = std::env::var("DEPOT_ADMIN_PASSWORD").ok()?;
    (!email.is_empty() && !password.is_empty()).then_some((email, password))
}
