use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    claims::Role,
    repo_types::{NewUser, User, UserChanges},
};
use crate::{
    config::AdminSeed,
    error::{AppError, AuthError, StoreError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Hashes on the blocking pool.
pub async fn hash_password(state: &AppState, plain: String) -> Result<String, AppError> {
    let passwords = state.passwords.clone();
    Ok(tokio::task::spawn_blocking(move || passwords.hash(&plain))
        .await
        .context("password hashing task")??)
}

/// Creates a user, relying on the store's unique constraint for duplicate emails.
pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: String,
    role: Role,
) -> Result<User, AppError> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if !is_valid_email(email) {
        return Err(AppError::Validation("invalid email".into()));
    }

    let password_hash = hash_password(state, password).await?;
    let new = NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password_hash,
        role,
    };

    match state.users.create(new).await {
        Ok(user) => Ok(user),
        Err(StoreError::Conflict) => {
            warn!(email = %email, "email already registered");
            Err(AppError::Validation("email already registered".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the user iff the password matches. Unknown emails and wrong passwords
/// take the same path and yield the same error.
pub async fn check_credentials(
    state: &AppState,
    email: &str,
    password: String,
) -> Result<User, AppError> {
    let user = state.users.find_by_email(email.trim()).await?;

    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let passwords = state.passwords.clone();
    let verified = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => passwords.verify(&password, &hash),
        None => passwords.verify_dummy(&password),
    })
    .await
    .context("password verification task")?;

    match user {
        Some(user) if verified => Ok(user),
        Some(user) => {
            warn!(user_id = %user.id, "login invalid password");
            Err(AuthError::Invalid.into())
        }
        None => {
            warn!("login unknown email");
            Err(AuthError::Invalid.into())
        }
    }
}

/// Makes sure the configured administrator exists and holds the admin role.
pub async fn ensure_admin(state: &AppState, seed: &AdminSeed) -> Result<User, AppError> {
    match state.users.find_by_email(seed.email.trim()).await? {
        Some(user) if user.role == Role::Admin => {
            info!(user_id = %user.id, "admin account present");
            Ok(user)
        }
        Some(user) => {
            let changes = UserChanges {
                role: Some(Role::Admin),
                ..Default::default()
            };
            let promoted = state
                .users
                .update(user.id, changes)
                .await?
                .ok_or(AppError::NotFound("user"))?;
            info!(user_id = %promoted.id, "existing account promoted to admin");
            Ok(promoted)
        }
        None => {
            let user = register_user(
                state,
                &seed.name,
                &seed.email,
                seed.password.clone(),
                Role::Admin,
            )
            .await?;
            info!(user_id = %user.id, "admin account created");
            Ok(user)
        }
    }
}
