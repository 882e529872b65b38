//! Catalog, upload and download handlers.

use super::auth::{invalid_json, require_admin, require_session, ApiResponse};
use super::{ApiError, AppState};
use crate::books::BookDraft;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// GET /books/
pub(crate) async fn handle_list_books(State(state): State<AppState>) -> ApiResponse {
    let books = state.books.list()?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "books": books }))))
}

/// GET /books/{book_id}
pub(crate) async fn handle_get_book(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> ApiResponse {
    let book = state.books.get(&book_id)?.ok_or(ApiError::BookNotFound)?;
    let body = serde_json::to_value(&book).map_err(ApiError::internal)?;
    Ok((StatusCode::OK, Json(body)))
}

/// POST /books/: Admin only.
pub(crate) async fn handle_create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BookDraft>, JsonRejection>,
) -> ApiResponse {
    let admin = require_admin(&state, &headers)?;
    let Json(draft) = body.map_err(|e| invalid_json(&e))?;
    let book = state.books.create(&draft.normalized()?)?;
    tracing::debug!(username = %admin.username, book_id = %book.id, "Book added");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Book added successfully",
            "book": book,
        })),
    ))
}

/// PUT /books/{book_id}: Admin only.
pub(crate) async fn handle_update_book(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<BookDraft>, JsonRejection>,
) -> ApiResponse {
    require_admin(&state, &headers)?;
    let Json(draft) = body.map_err(|e| invalid_json(&e))?;
    let book = state
        .books
        .update(&book_id, &draft.normalized()?)?
        .ok_or(ApiError::BookNotFound)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Book updated successfully",
            "book": book,
        })),
    ))
}

/// DELETE /books/{book_id}: Admin only. Removes the stored file too.
pub(crate) async fn handle_delete_book(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    require_admin(&state, &headers)?;
    let book = state.books.delete(&book_id)?.ok_or(ApiError::BookNotFound)?;

    if let Some(ref stored) = book.stored_file {
        // The record is already gone; an orphaned file is only worth a warning.
        if let Err(e) = state.files.remove(stored).await {
            tracing::warn!(book_id = %book.id, file = %stored, "Failed to remove book file: {e}");
        }
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Book deleted successfully"})),
    ))
}

/// Book fields may also arrive as query parameters on `/upload`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadQuery {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
}

/// POST /upload: Admin only. Multipart `file` plus `title`, `author` and
/// optional `description`; creates a book with the file attached.
pub(crate) async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResponse {
    require_admin(&state, &headers)?;
    let mut multipart =
        multipart.map_err(|e| ApiError::InvalidRequest(format!("Invalid upload: {}", e.body_text())))?;

    let UploadQuery {
        mut title,
        mut author,
        mut description,
    } = query;
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid upload: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Invalid upload: {}", e.body_text()))
                })?;
                file = Some((filename, bytes.to_vec()));
            }
            "title" | "author" | "description" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Invalid upload: {}", e.body_text()))
                })?;
                match name.as_str() {
                    "title" => title = Some(text),
                    "author" => author = Some(text),
                    _ => description = Some(text),
                }
            }
            _ => {}
        }
    }

    let (filename, contents) =
        file.ok_or_else(|| ApiError::InvalidRequest("Missing file field".into()))?;
    if contents.is_empty() {
        return Err(ApiError::InvalidRequest("Uploaded file is empty".into()));
    }
    let draft = BookDraft {
        title: title.unwrap_or_default(),
        author: author.unwrap_or_default(),
        description,
    }
    .normalized()?;

    let book = state.books.create(&draft)?;
    let stored = match state
        .files
        .save(&book.id, filename.as_deref(), &contents)
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            // No half-created books: drop the record if the file never landed.
            if let Err(cleanup) = state.books.delete(&book.id) {
                tracing::warn!(book_id = %book.id, "Failed to roll back book record: {cleanup}");
            }
            return Err(e.into());
        }
    };
    let book = state
        .books
        .attach_file(&book.id, &stored)?
        .ok_or(ApiError::BookNotFound)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "File Uploaded",
            "book": book,
        })),
    ))
}

/// GET /download/{book_id}: Any signed-in user. Streams the stored file.
pub(crate) async fn handle_download(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = require_session(&state, &headers)?;
    let book = state.books.get(&book_id)?.ok_or(ApiError::BookNotFound)?;
    let stored = book.stored_file.as_deref().ok_or(ApiError::FileMissing)?;
    let file = state.files.open(stored).await?;

    let content_type = mime_guess::from_path(stored).first_or_octet_stream();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_filename(&book.title, stored)
    );
    tracing::info!(username = %identity.username, book_id = %book.id, "Book downloaded");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type.as_ref()).map_err(ApiError::internal)?,
            ),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition).map_err(ApiError::internal)?,
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Header-safe download name: the title's plain characters plus the stored
/// extension, falling back to the stored name.
fn download_filename(title: &str, stored: &str) -> String {
    let base: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let base = base.trim();
    if base.is_empty() {
        return stored.to_owned();
    }
    match std::path::Path::new(stored).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{base}.{ext}"),
        None => base.to_owned(),
    }
}
