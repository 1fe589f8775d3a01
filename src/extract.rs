//! Request extractors whose rejections are `AppError`s.
//!
//! axum's stock `Json`, `Path` and `Form` answer a malformed request with a plain
//! text body. These wrappers route the rejection through `AppError`, so every 4xx
//! carries the same `{code, message}` JSON.

use axum::{
    Form,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::header,
};

use crate::{
    error::{AppError, Result},
    forms::UploadForm,
    models::LoginForm,
};

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// LoginCredentials
///
/// `username`/`password` from either an `application/x-www-form-urlencoded` or a
/// `multipart/form-data` body, the two encodings an OAuth2 password-flow client may
/// send. Values are taken verbatim.
#[derive(Debug)]
pub struct LoginCredentials(pub LoginForm);

impl<S> FromRequest<S> for LoginCredentials
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| {
                value
                    .to_ascii_lowercase()
                    .starts_with("multipart/form-data")
            });

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            let form = UploadForm::from_multipart(multipart).await?;
            return Ok(LoginCredentials(LoginForm {
                username: form.raw_text("username")?,
                password: form.raw_text("password")?,
            }));
        }

        let Form(form) = Form::<LoginForm>::from_request(req, state).await?;
        Ok(LoginCredentials(form))
    }
}
