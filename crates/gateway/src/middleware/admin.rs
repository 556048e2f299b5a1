//! Admin access control
//!
//! Admins are listed in `app_admins`. The whole `/api/admin` surface sits
//! behind [`require_admin`]; handlers that let an admin act for another user
//! call [`ensure_admin`] themselves.

use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chairs_common::{auth::AuthUser, errors::AppError, Repository};
use uuid::Uuid;

/// Reject callers that are not in `app_admins`
pub async fn ensure_admin(repo: &Repository, user_id: Uuid) -> Result<(), AppError> {
    if repo.is_admin(user_id).await? {
        Ok(())
    } else {
        tracing::warn!(user_id = %user_id, "Admin access denied");
        Err(AppError::AdminOnly)
    }
}

/// Authenticate, then check admin membership
pub async fn require_admin(
    State(state): State<AppState>,
    user: AuthUser,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let repo = Repository::new(state.db.clone());
    ensure_admin(&repo, user.id).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
