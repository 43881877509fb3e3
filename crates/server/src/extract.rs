use std::collections::HashMap;

use axum::{
    Form,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
    },
};
use deployment::Deployment;
use services::services::{identity::AuthUser, validation::ImageUpload};

use crate::{DeploymentImpl, error::ApiError};

/// Caller identity taken from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthUser);

impl FromRequestParts<DeploymentImpl> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let user = deployment.identity().verify_header(header)?;
        Ok(Self(user))
    }
}

/// A buffered form body: text fields and file parts by name.
///
/// Accepts `multipart/form-data` and, for text-only forms,
/// `application/x-www-form-urlencoded`. File inputs submitted without a file
/// (empty name and body) are dropped.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, ImageUpload>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<ImageUpload> {
        self.files.remove(name)
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let urlencoded = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        if urlencoded {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
            return Ok(Self {
                fields,
                files: HashMap::new(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidForm(e.body_text()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::InvalidForm(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            mime_guess::from_path(&file_name)
                                .first_or_octet_stream()
                                .to_string()
                        });
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        ImageUpload {
                            file_name,
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }
}
