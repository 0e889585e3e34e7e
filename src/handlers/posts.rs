use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use garde::Validate;

use crate::{
    error::{AppError, Result},
    json::{PathParam, SonicJson},
    middleware_layer::auth::Viewer,
    models::{
        post::{Post, PostRequest},
        session::Principal,
    },
    services::{authorization::has_elevated_access, media::purge_post_media, notifier::Email},
    state::AppState,
};

fn can_see_restricted(viewer: &Viewer) -> bool {
    viewer
        .principal()
        .is_some_and(|principal| has_elevated_access(principal.role))
}

/// The ten most recent posts the viewer may see.
pub async fn recent_posts(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<SonicJson<Vec<Post>>> {
    let posts = state.posts.recent(can_see_restricted(&viewer)).await?;
    Ok(SonicJson(posts))
}

/// The ten most recent public posts, whoever asks.
pub async fn recent_public_posts(State(state): State<AppState>) -> Result<SonicJson<Vec<Post>>> {
    Ok(SonicJson(state.posts.recent(false).await?))
}

pub async fn get_post(
    State(state): State<AppState>,
    viewer: Viewer,
    PathParam(post_id): PathParam<i32>,
) -> Result<SonicJson<Post>> {
    let post = state
        .posts
        .find(post_id)
        .await?
        .ok_or(AppError::NotFound("post"))?;

    if post.restricted && !can_see_restricted(&viewer) {
        return Err(AppError::Forbidden(format!("post {} is restricted", post_id)));
    }
    Ok(SonicJson(post))
}

/// Publishes a post and emails subscribers. Admin only.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    SonicJson(request): SonicJson<PostRequest>,
) -> Result<(StatusCode, SonicJson<Post>)> {
    let draft = request.post_data;
    draft.validate()?;

    let post = state.posts.create(&draft, principal.subject_id).await?;
    tracing::info!("📝 Post {} created by {}", post.post_id, principal.subject_id);

    announce(&state, &post).await;
    Ok((StatusCode::CREATED, SonicJson(post)))
}

/// Sends the new-post email to every subscriber allowed to read it.
/// Failures are logged and never fail the request.
async fn announce(state: &AppState, post: &Post) {
    let subscribers = match state.users.subscribers().await {
        Ok(subscribers) => subscribers,
        Err(e) => {
            tracing::error!("❌ Could not load subscribers for post {}: {}", post.post_id, e);
            return;
        }
    };

    let mut sent = 0usize;
    for user in subscribers
        .iter()
        .filter(|user| !post.restricted || has_elevated_access(user.role))
    {
        let email = Email::new_post(&state.config.notify_from, user, post);
        match state.notifier.send(email).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::error!("❌ Notification to user {} failed: {}", user.id, e),
        }
    }
    tracing::debug!("📧 Post {} announced to {} subscribers", post.post_id, sent);
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(post_id): PathParam<i32>,
    SonicJson(request): SonicJson<PostRequest>,
) -> Result<SonicJson<Post>> {
    let draft = request.post_data;
    draft.validate()?;

    let post = state
        .posts
        .update(post_id, &draft, principal.subject_id)
        .await?
        .ok_or(AppError::NotFound("post"))?;
    tracing::info!("✏️ Post {} updated by {}", post_id, principal.subject_id);
    Ok(SonicJson(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(post_id): PathParam<i32>,
) -> Result<StatusCode> {
    purge_post_media(state.media.as_ref(), state.blobs.as_ref(), post_id).await?;
    if !state.posts.delete(post_id).await? {
        return Err(AppError::NotFound("post"));
    }
    tracing::info!("🗑️ Post {} deleted by {}", post_id, principal.subject_id);
    Ok(StatusCode::NO_CONTENT)
}
