use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;

/// ValidatedJson
///
/// JSON body extractor that runs `validator` rules after deserialisation.
/// Both a malformed body and a failing rule reject with 422; for rule failures
/// the message is that of the first offending field (by field name).
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| ApiError::validation(first_error_message(&errors)))?;

        Ok(Self(value))
    }
}

/// Message for a path segment that does not parse.
pub const INVALID_PATH_ID: &str = "Please provide a valid id.";

/// ValidatedPath
///
/// Path extractor whose rejection is a 422 in the response envelope, so a
/// malformed `{id}` fails the same way as a malformed body.
#[derive(Debug, Clone)]
pub struct ValidatedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(reason = %rejection.body_text(), "path rejected");
                ApiError::validation(INVALID_PATH_ID)
            })?;

        Ok(Self(value))
    }
}

/// first_error_message
///
/// Picks one message out of a validation report. Field order in the report is
/// unspecified, so fields are sorted to keep the answer stable.
pub fn first_error_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, errs)| {
            errs.first().map(|err| {
                err.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .unwrap_or_else(|| "request body is invalid".to_string())
}
