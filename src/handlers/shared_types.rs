//! Request/response plumbing shared by the resource handlers.

use crate::domain::Filter;
use crate::error::ApiError;
use crate::validation::Validator;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default page size for posts, comments and the feed.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Default page size for follower/following lists.
pub const DEFAULT_FOLLOW_PAGE_SIZE: u32 = 50;

/// JSON body extractor whose rejections use the API's error format.
///
/// Malformed JSON, wrong field types, unknown fields (input types use
/// `deny_unknown_fields`) and oversized bodies all become a 400 with the parser's
/// description.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Raw `page` / `page_size` query parameters. Kept as strings so a non-integer value
/// is reported as a field error rather than a query rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    page: Option<String>,
    page_size: Option<String>,
}

impl PageParams {
    /// Parse and validate into a [`Filter`], applying defaults for absent values.
    pub fn into_filter(self, default_page_size: u32) -> Result<Filter, ApiError> {
        // ---
        let mut v = Validator::new();

        let page = read_int(&mut v, self.page.as_deref(), "page", 1);
        let page_size = read_int(&mut v, self.page_size.as_deref(), "page_size", default_page_size);

        let filter = Filter::new(page, page_size);
        filter.validate(&mut v);
        v.finish()?;

        Ok(filter)
    }
}

/// Negative values clamp to zero and oversized ones to `u32::MAX`, so the range
/// checks in [`Filter::validate`] produce the message.
fn read_int(v: &mut Validator, raw: Option<&str>, key: &str, default: u32) -> u32 {
    // ---
    match raw.map(str::parse::<i64>) {
        None => default,
        Some(Ok(n)) => u32::try_from(n.max(0)).unwrap_or(u32::MAX),
        Some(Err(_)) => {
            v.add_error(key, "must be an integer value");
            default
        }
    }
}

/// Parse a numeric path id. Anything unparsable or below 1 names no resource.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    // ---
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// A 422 carrying a single field error, for checks that only the store can make.
pub fn field_error(key: &str, message: impl ToString) -> ApiError {
    // ---
    ApiError::Validation(BTreeMap::from([(key.to_string(), message.to_string())]))
}

/// `{"message": ...}` envelope for operations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Json<Self> {
        Json(Self { message })
    }
}
