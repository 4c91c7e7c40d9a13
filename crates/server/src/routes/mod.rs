pub mod auth;
pub mod freelancers;
pub mod hackathons;
pub mod matching;
pub mod profile;
pub mod startups;
pub mod teams;

use axum::{body::Bytes, extract::Multipart};

use crate::error::{AppError, Result};

/// First file field of a multipart upload, as `(file name, bytes)`.
pub async fn read_image_upload(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file {file_name}: {e}")))?;

        return Ok((file_name, data));
    }

    Err(AppError::Validation("No image file was uploaded".to_string()))
}

/// Rejects writes by anyone but the record's owner.
pub fn require_owner(owner_id: &str, user_id: &str, action: &str) -> Result<()> {
    if owner_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Only the owner can {action}"
        )));
    }
    Ok(())
}

/// Trims every entry, dropping blanks and repeats.
pub fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

pub fn require_field(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "Please fill out the \"{field}\" field."
        )));
    }
    Ok(())
}
