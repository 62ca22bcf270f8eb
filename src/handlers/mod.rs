//! HTTP handlers, grouped by resource.
//!
//! Handlers stay thin: parse and validate input, ask `authz` for a verdict, call the
//! repository, shape the response. Every failure is an `ApiError`, propagated with `?`.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
};

pub mod clubs;
pub mod comments;
pub mod events;
pub mod users;

/// ApiJson
///
/// `axum::Json` with its rejection mapped into `ApiError`, so malformed bodies get the
/// same `{"message": ...}` shape as every other error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with a JSON rejection. A malformed id is a 400 with a message
/// body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with a JSON rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Removes an upload nothing references any more: the write that would have owned it
/// failed, or a newer file replaced it. Errors are logged, not surfaced.
pub(crate) async fn discard_upload(state: &AppState, reference: Option<&str>) {
    let Some(reference) = reference else {
        return;
    };
    if let Err(err) = state.storage.remove(reference).await {
        tracing::warn!(reference, error = %err, "failed to remove orphaned upload");
    }
}

/// Trims `value` and rejects it if missing or blank.
pub(crate) fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} is required.")))
}

/// Trims `value`; blank counts as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an ISO calendar date. A full timestamp is accepted too and truncated to its date.
pub(crate) fn parse_date(raw: &str, field: &str) -> ApiResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| ApiError::validation(format!("{field} must be a date like 2024-05-01.")))
}

/// parse_datetime
///
/// Accepts RFC 3339 (`2024-05-01T18:00:00Z`), a naive timestamp (`2024-05-01T18:00`,
/// taken as UTC) or a bare date (midnight UTC).
pub(crate) fn parse_datetime(raw: &str, field: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ApiError::validation(format!("{field} must be a date or an RFC 3339 timestamp."))
        })
}

pub(crate) fn parse_uuid(raw: &str, field: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(format!("{field} must be a valid id.")))
}

/// A file part of a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// FormData
///
/// A fully buffered multipart form: text parts by name (repeatable) and file parts by
/// name. Parts are small (text fields plus one picture under the body limit), so
/// buffering keeps the handlers free of streaming logic.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            // Repeated fields may arrive as `clubLeaders[]`.
            let name = name.trim_end_matches("[]").to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await?;
                    // Browsers submit an empty part for an untouched file input.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { file_name, data });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    /// First value of a text field, trimmed; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Every non-blank value of a repeatable field. Comma-separated values are split so
    /// clients may also send `clubLeaders=a,b`.
    pub fn all(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|value| value.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}
