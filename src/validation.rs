// Client-side input checks. These run before any request is built.
use crate::client::ApiError;
use crate::model::{UploadRequest, is_valid_lat, is_valid_lon};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-z]+\.+[a-z]+$").expect("email pattern is valid")
});

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name", "Name is required"));
    }
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(ApiError::validation(
            "name",
            format!("Name must be at least {} characters", MIN_NAME_LENGTH),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("email", "Email is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ApiError::validation("email", "Enter a valid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.trim().is_empty() {
        return Err(ApiError::validation("password", "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(
            "password",
            format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.trim().is_empty() {
        return Err(ApiError::validation(
            "description",
            "Description cannot be empty",
        ));
    }
    Ok(())
}

/// Coordinates travel as a pair or not at all.
pub fn validate_coordinates(lat: Option<f64>, lon: Option<f64>) -> Result<(), ApiError> {
    match (lat, lon) {
        (None, None) => Ok(()),
        (Some(lat), Some(lon)) => {
            if !is_valid_lat(lat) {
                return Err(ApiError::validation(
                    "lat",
                    "Latitude must be between -90 and 90",
                ));
            }
            if !is_valid_lon(lon) {
                return Err(ApiError::validation(
                    "lon",
                    "Longitude must be between -180 and 180",
                ));
            }
            Ok(())
        }
        (Some(_), None) => Err(ApiError::validation(
            "lon",
            "Longitude is required when latitude is set",
        )),
        (None, Some(_)) => Err(ApiError::validation(
            "lat",
            "Latitude is required when longitude is set",
        )),
    }
}

pub fn validate_upload(request: &UploadRequest) -> Result<(), ApiError> {
    validate_description(&request.description)?;
    if request.image.is_empty() {
        return Err(ApiError::validation("photo", "Please select an image"));
    }
    validate_coordinates(request.lat, request.lon)
}
