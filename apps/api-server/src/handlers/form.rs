//! Multipart post form parsing.

use actix_multipart::{Field, Multipart};
use futures::StreamExt;

use quill_core::domain::{PostFields, UploadedFile};
use quill_shared::dto::PostFormInput;

use crate::middleware::error::{AppError, AppResult};

/// A submitted post form: `title`, `body`, and an optional `image` file part.
#[derive(Debug, Default)]
pub struct PostForm {
    pub input: PostFormInput,
    pub image: Option<UploadedFile>,
}

impl PostForm {
    pub fn fields(&self) -> PostFields {
        PostFields::new(self.input.title.clone(), self.input.body.clone())
    }

    /// Read the whole form, rejecting any single part over `max_bytes`.
    pub async fn read(mut payload: Multipart, max_bytes: usize) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(item) = payload.next().await {
            let field =
                item.map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?;
            let name = field.name().unwrap_or_default().to_string();
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);
            let data = read_field(field, max_bytes).await?;

            match name.as_str() {
                "title" => form.input.title = text(&name, data)?,
                "body" => form.input.body = text(&name, data)?,
                "image" => {
                    let filename = filename.unwrap_or_default();
                    // Browsers send an empty part when no file was chosen.
                    if filename.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.image = Some(UploadedFile::new(filename, data));
                }
                other => tracing::debug!(field = %other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }
}

async fn read_field(mut field: Field, max_bytes: usize) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Upload interrupted: {e}")))?;
        if data.len() + chunk.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Each form part is limited to {max_bytes} bytes"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn text(name: &str, data: Vec<u8>) -> AppResult<String> {
    String::from_utf8(data)
        .map_err(|_| AppError::BadRequest(format!("The {name} field must be UTF-8 text")))
}
