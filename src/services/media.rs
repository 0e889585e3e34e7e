use uuid::Uuid;

use crate::{
    error::Result,
    repositories::media::MediaRepository,
    services::blob_store::BlobStore,
};

/// Largest accepted single file.
pub const MAX_FILE_SIZE: usize = 10 << 20;
/// Largest accepted upload request, all files together.
pub const MAX_TOTAL_UPLOAD_SIZE: usize = 50 << 20;
pub const MAX_FILES_PER_REQUEST: usize = 5;

/// Content types accepted after sniffing, with the extension they are stored under.
const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("video/mp4", "mp4"),
];

const MAX_FILENAME_LEN: usize = 100;

/// Detects the content type from the file's magic bytes. The client's
/// declared type and extension are ignored.
///
/// # Returns
///
/// The MIME type if it is one of the accepted media types.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == kind.mime_type())
        .map(|(mime, _)| *mime)
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

/// Reduces a client-supplied file name to a flat, bounded name made of
/// `[A-Za-z0-9._-]` only, so it can go into a URL path unescaped.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "upload".to_string();
    }
    if cleaned.chars().count() <= MAX_FILENAME_LEN {
        return cleaned.to_string();
    }

    // Keep the extension when truncating.
    let ext: String = match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= 10 => cleaned[dot..].to_string(),
        _ => String::new(),
    };
    let stem: String = cleaned
        .chars()
        .take(MAX_FILENAME_LEN - ext.chars().count())
        .collect();
    format!("{}{}", stem, ext)
}

/// The storage name of an uploaded file: unique, grouped by post, and
/// carrying the extension of the sniffed type.
pub fn blob_name(post_id: i32, filename: &str, content_type: &str) -> String {
    let safe = sanitize_filename(filename);
    let stem = match safe.rfind('.') {
        Some(dot) if dot > 0 => &safe[..dot],
        _ => safe.as_str(),
    };
    match extension_for(content_type) {
        Some(ext) => format!("{}_{}_{}.{}", post_id, Uuid::new_v4().simple(), stem, ext),
        None => format!("{}_{}_{}", post_id, Uuid::new_v4().simple(), safe),
    }
}

/// Deletes every attachment row of a post, then the blobs behind them.
/// Blob failures are logged; the rows are already gone.
pub async fn purge_post_media(
    media: &dyn MediaRepository,
    blobs: &dyn BlobStore,
    post_id: i32,
) -> Result<usize> {
    let removed = media.delete_for_post(post_id).await?;
    for item in &removed {
        if let Err(e) = blobs.delete(&item.blob_name).await {
            tracing::error!("❌ Could not delete blob {}: {}", item.blob_name, e);
        }
    }
    tracing::debug!("🗑️ Removed {} media items of post {}", removed.len(), post_id);
    Ok(removed.len())
}
