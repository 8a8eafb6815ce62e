//! Explicit response-mode selection and dual-format body extraction.
//!
//! Browser clients get redirects and rendered pages; programmatic clients
//! get JSON. The mode is decided once, from the Accept header, instead of
//! sniffing how the request was initiated.

use axum::{
    Form, Json, RequestExt,
    extract::{FromRequest, Request},
    http::header::{ACCEPT, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondMode {
    Browser,
    Json,
}

impl RespondMode {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let accept = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if accept.contains("text/html") {
            Self::Browser
        } else {
            Self::Json
        }
    }
}

/// Accepts either an urlencoded form (browser) or a JSON body
/// (programmatic client), keyed off the Content-Type header.
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + 'static,
{
    type Rejection = Response;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            let Json(value) = req
                .extract::<Json<T>, _>()
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Form(value) = req
                .extract::<Form<T>, _>()
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}
