use axum::{
    Extension,
    extract::{Multipart, State, multipart::Field, multipart::MultipartRejection},
    http::StatusCode,
};
use serde::Serialize;

use crate::{
    error::{AppError, Result},
    json::{PathParam, SonicJson},
    middleware_layer::auth::Viewer,
    models::{media::MediaLink, session::Principal},
    services::{
        authorization::has_elevated_access,
        media::{
            MAX_FILE_SIZE, MAX_FILES_PER_REQUEST, MAX_TOTAL_UPLOAD_SIZE, blob_name,
            purge_post_media, sniff_content_type,
        },
    },
    state::AppState,
};

/// Result of an upload request.
#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub message: &'static str,
    pub successful: usize,
    pub failed: usize,
}

/// A file part read from the request.
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
    oversized: bool,
}

/// Reads one file part, keeping at most `MAX_FILE_SIZE` bytes of it.
async fn read_file(mut field: Field<'_>, total: &mut usize) -> Result<UploadedFile> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let mut bytes = Vec::new();
    let mut oversized = false;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::bad_request("error reading upload", e.body_text()))?
    {
        *total += chunk.len();
        if *total > MAX_TOTAL_UPLOAD_SIZE {
            return Err(AppError::bad_request(
                "request too large",
                format!("maximum upload size is {} MB", MAX_TOTAL_UPLOAD_SIZE >> 20),
            ));
        }
        if bytes.len() + chunk.len() > MAX_FILE_SIZE {
            oversized = true;
            bytes.clear();
        }
        if !oversized {
            bytes.extend_from_slice(&chunk);
        }
    }

    Ok(UploadedFile {
        filename,
        bytes,
        oversized,
    })
}

async fn read_text(field: Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::bad_request(format!("error reading {}", name), e.body_text()))
}

/// Handles media upload for a post. Admin only.
///
/// Each file is sniffed and stored independently: 200 when all were
/// stored, 206 when some were, 400 when none were.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, SonicJson<UploadSummary>)> {
    let mut multipart = multipart?;
    let mut post_id: Option<String> = None;
    let mut restricted: Option<String> = None;
    let mut files = Vec::new();
    let mut total = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request("not a valid multipart request", e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "postId" => post_id = Some(read_text(field, "postId").await?),
            "restricted" => restricted = Some(read_text(field, "restricted").await?),
            "photos" | "photos[]" => {
                if files.len() == MAX_FILES_PER_REQUEST {
                    return Err(AppError::bad_request(
                        "too many files",
                        format!("at most {} files per upload", MAX_FILES_PER_REQUEST),
                    ));
                }
                files.push(read_file(field, &mut total).await?);
            }
            _ => {}
        }
    }

    let post_id: i32 = post_id
        .as_deref()
        .map(str::trim)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| AppError::bad_request("postId must be an integer", ""))?;
    let restricted: bool = restricted
        .as_deref()
        .map(str::trim)
        .and_then(|flag| flag.parse().ok())
        .ok_or_else(|| AppError::bad_request("restricted must be a boolean", ""))?;

    if files.is_empty() {
        return Err(AppError::bad_request("no files found", ""));
    }
    if state.posts.find(post_id).await?.is_none() {
        return Err(AppError::NotFound("post"));
    }

    let mut successful = 0usize;
    let mut failed = 0usize;

    for file in files {
        if file.oversized {
            tracing::warn!("⚠️ {} exceeds {} MB", file.filename, MAX_FILE_SIZE >> 20);
            failed += 1;
            continue;
        }
        let Some(content_type) = sniff_content_type(&file.bytes) else {
            tracing::warn!("⚠️ Rejected {}: not an accepted media type", file.filename);
            failed += 1;
            continue;
        };

        let name = blob_name(post_id, &file.filename, content_type);
        state.blobs.put(&name, &file.bytes).await?;

        if let Err(e) = state
            .media
            .insert(post_id, &name, content_type, restricted)
            .await
        {
            if let Err(cleanup) = state.blobs.delete(&name).await {
                tracing::error!("❌ Orphaned blob {}: {}", name, cleanup);
            }
            return Err(e);
        }
        successful += 1;
    }

    tracing::info!(
        "🖼️ Upload for post {} by {}: {} stored, {} rejected",
        post_id,
        principal.subject_id,
        successful,
        failed
    );

    if successful == 0 {
        return Err(AppError::bad_request(
            "all uploads failed",
            "files must be jpeg, png, gif or mp4 and at most 10 MB",
        ));
    }

    let (status, message) = if failed == 0 {
        (StatusCode::OK, "all files uploaded successfully")
    } else {
        (StatusCode::PARTIAL_CONTENT, "some files were uploaded successfully")
    };
    Ok((
        status,
        SonicJson(UploadSummary {
            message,
            successful,
            failed,
        }),
    ))
}

/// Links to a post's media. Restricted items need elevated access.
pub async fn get_media(
    State(state): State<AppState>,
    viewer: Viewer,
    PathParam(post_id): PathParam<i32>,
) -> Result<SonicJson<Vec<MediaLink>>> {
    let items = state.media.for_post(post_id).await?;

    let elevated = viewer
        .principal()
        .is_some_and(|principal| has_elevated_access(principal.role));
    if !elevated && items.iter().any(|item| item.restricted) {
        return Err(AppError::Forbidden(format!(
            "post {} has restricted media",
            post_id
        )));
    }

    let links = items
        .into_iter()
        .map(|item| MediaLink {
            url: state.blobs.url_for(&item.blob_name),
            content_type: item.content_type,
            name: item.blob_name,
            post_id: item.post_id,
        })
        .collect();
    Ok(SonicJson(links))
}

/// Removes a post's media rows and blobs. Admin only.
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    PathParam(post_id): PathParam<i32>,
) -> Result<StatusCode> {
    let removed = purge_post_media(state.media.as_ref(), state.blobs.as_ref(), post_id).await?;
    tracing::info!(
        "🗑️ {} media items of post {} deleted by {}",
        removed,
        post_id,
        principal.subject_id
    );
    Ok(StatusCode::NO_CONTENT)
}
