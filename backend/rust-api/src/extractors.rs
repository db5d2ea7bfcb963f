use axum::{
    extract::{FromRequest, Request},
    Json,
};

use crate::error::ApiError;

/// JSON extractor whose rejection is an [`ApiError`], so a body the session
/// endpoints cannot parse gets the same `{message, status}` envelope as every
/// other failure instead of axum's plain-text rejection.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::warn!("rejecting unreadable assessment payload: {}", rejection);
            ApiError::BadRequest(format!("could not read request body: {}", rejection))
        })?;
        Ok(AppJson(value))
    }
}
