use crate::AppState;
use crate::api::error::AppError;
use crate::services::asset_lifecycle::UploadedFile;
use crate::services::changeset::FormPayload;
use crate::utils::validation::validate_file_size;
use async_trait::async_trait;
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::{header, request::Parts},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// `Json<T>` whose rejections become `AppError::Validation`.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(AppJson(value))
    }
}

/// Numeric `:id` path segment.
pub struct RecordId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        raw.parse::<i32>()
            .map(RecordId)
            .map_err(|_| AppError::Validation(format!("Invalid id '{}'", raw)))
    }
}

/// Query string as a flat key/value map.
pub struct Filters(pub HashMap<String, String>);

#[async_trait]
impl<S> FromRequestParts<S> for Filters
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(map) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Filters(map))
    }
}

/// Create/update body: `multipart/form-data` (fields plus image files) or a
/// flat JSON object. An empty body is an empty payload.
#[async_trait]
impl FromRequest<AppState> for FormPayload {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return read_multipart(multipart, state.config.max_upload_size).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormPayload::default());
        }

        if !content_type.is_empty() && !content_type.starts_with("application/json") {
            return Err(AppError::Validation(format!(
                "Unsupported content type '{}': send JSON or multipart/form-data",
                content_type
            )));
        }

        read_json(&body)
    }
}

async fn read_multipart(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<FormPayload, AppError> {
    let mut payload = FormPayload::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            payload.fields.insert(name, Some(text));
            continue;
        };

        let content_type = field.content_type().map(str::to_string);

        // Stream so an oversized file is refused without buffering all of it
        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            validate_file_size(data.len() + chunk.len(), max_size)?;
            data.extend_from_slice(&chunk);
        }

        // Browsers send an empty part for an untouched file input
        if file_name.is_empty() && data.is_empty() {
            continue;
        }

        payload.files.push(UploadedFile {
            slot: name,
            original_name: file_name,
            content_type,
            data: data.into(),
        });
    }

    Ok(payload)
}

fn read_json(body: &[u8]) -> Result<FormPayload, AppError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;

    let serde_json::Value::Object(object) = value else {
        return Err(AppError::Validation("JSON body must be an object".to_string()));
    };

    let fields = object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s),
                other => Some(other.to_string()),
            };
            (key, value)
        })
        .collect();

    Ok(FormPayload {
        fields,
        files: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_values_are_flattened() {
        let payload = read_json(
            br#"{"name":"Jaipur","status":0,"description":null,"faqs":[{"question":"Q","answer":"A"}]}"#,
        )
        .unwrap();

        assert_eq!(payload.fields["name"], Some("Jaipur".to_string()));
        assert_eq!(payload.fields["status"], Some("0".to_string()));
        assert_eq!(payload.fields["description"], None);
        let faqs = payload.fields["faqs"].as_deref().unwrap();
        assert!(faqs.starts_with('[') && faqs.contains("\"question\":\"Q\""));
    }

    #[test]
    fn test_json_must_be_object() {
        assert!(read_json(b"[1,2]").is_err());
        assert!(read_json(b"{broken").is_err());
    }
}
