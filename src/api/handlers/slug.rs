use crate::api::error::{AppError, ErrorBody};
use crate::utils::slug::slugify;
use axum::{Json, extract::Query};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize)]
pub struct SlugQuery {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct SlugResponse {
    #[schema(example = "love-problem-solution")]
    pub slug: String,
}

/// Suggests the slug the site expects for a name. Writes never re-derive
/// slugs; the admin panel fills the field from this.
#[utoipa::path(
    get,
    path = "/api/admin/slug",
    params(
        ("text" = String, Query, description = "Name or title to derive the slug from")
    ),
    responses(
        (status = 200, description = "Suggested slug", body = SlugResponse),
        (status = 400, description = "Nothing to derive a slug from", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn suggest(Query(query): Query<SlugQuery>) -> Result<Json<SlugResponse>, AppError> {
    let slug = slugify(&query.text);
    if slug.trim_matches('-').is_empty() {
        return Err(AppError::Validation(
            "text must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(Json(SlugResponse { slug }))
}
