use std::{collections::HashMap, str::FromStr};

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use axum_extra::extract::Multipart;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// A file part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// Flat request fields, read either from a multipart form or from a JSON
/// object. The write endpoints accept both, so handlers read fields by name
/// instead of deserializing a fixed struct.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: HashMap::new(),
        }
    }

    /// Builds fields from a JSON object. Scalars are kept as their text form,
    /// nested values as JSON text, and nulls are dropped.
    pub fn from_json(object: serde_json::Map<String, Value>) -> Self {
        let fields = object.into_iter().filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        });
        Self::from_fields(fields)
    }

    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                if !file_name.is_empty() && !data.is_empty() {
                    form.files.insert(name, UploadedFile { file_name, data });
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Trimmed value of a field; blank fields count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn require(&self, name: &str, message: &str) -> AppResult<String> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(message.to_string()))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| AppError::Validation(format!("Invalid value for {}", name))),
        }
    }

    pub fn decimal(&self, name: &str) -> AppResult<Option<Decimal>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<Decimal>()
                .map(Some)
                .map_err(|_| AppError::Validation(format!("{} must be a number", name))),
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return FormData::from_multipart(multipart).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormData::default());
        }
        let object: serde_json::Map<String, Value> = serde_json::from_slice(&body)
            .map_err(|_| AppError::Validation("Request body must be a JSON object".to_string()))?;
        Ok(FormData::from_json(object))
    }
}
