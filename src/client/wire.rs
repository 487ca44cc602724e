// Request and response bodies of the Story API, as sent over the wire.
use crate::client::error::ApiError;
use crate::model::Story;
use serde::{Deserialize, Serialize};

/// The `error` / `message` pair every response body carries.
pub trait Envelope: Sized {
    fn is_error(&self) -> bool;
    fn message(&self) -> Option<&str>;

    /// A 2xx body flagged `error: true` becomes a server error, using
    /// `fallback` when the server left the message blank.
    fn into_checked(self, fallback: &str) -> Result<Self, ApiError> {
        if self.is_error() {
            return Err(ApiError::flagged(
                self.message().map(str::to_string),
                fallback,
            ));
        }
        Ok(self)
    }
}

macro_rules! envelope {
    ($($ty:ty),+ $(,)?) => {
        $(impl Envelope for $ty {
            fn is_error(&self) -> bool {
                self.error
            }

            fn message(&self) -> Option<&str> {
                self.message.as_deref()
            }
        })+
    };
}

#[derive(Serialize, Debug)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub login_result: Option<LoginResult>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoriesResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub list_story: Vec<Story>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub list_story: Option<Vec<Story>>,
}

envelope!(RegisterResponse, LoginResponse, StoriesResponse, UploadResponse);

/// Query for `GET stories`. `None` fields are left off the URL so the
/// server applies its own defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoriesQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub location: Option<u8>,
}

impl StoriesQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(location) = self.location {
            pairs.push(("location", location.to_string()));
        }
        pairs
    }
}

/// Multipart fields for `POST stories`.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub description: String,
    pub photo: Vec<u8>,
    pub file_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_result_is_optional() {
        let resp: LoginResponse =
            serde_json::from_str(r#"{"error":false,"message":"success"}"#).unwrap();
        assert!(resp.login_result.is_none());

        let resp: LoginResponse = serde_json::from_str(
            r#"{"error":false,"message":"success",
                "loginResult":{"userId":"user-1","name":"Ann","token":"tok"}}"#,
        )
        .unwrap();
        assert_eq!(resp.login_result.unwrap().user_id, "user-1");
    }

    #[test]
    fn flagged_body_is_rejected_with_fallback() {
        let resp: UploadResponse =
            serde_json::from_str(r#"{"error":true,"message":"Daily upload limit reached"}"#)
                .unwrap();
        assert_eq!(
            resp.into_checked("Upload failed").unwrap_err(),
            ApiError::ServerError {
                code: 200,
                message: "Daily upload limit reached".to_string()
            }
        );

        let resp: StoriesResponse = serde_json::from_str(r#"{"error":true}"#).unwrap();
        assert_eq!(
            resp.into_checked("Failed to load stories").unwrap_err().to_string(),
            "Failed to load stories"
        );

        let resp: RegisterResponse =
            serde_json::from_str(r#"{"error":false,"message":"User created"}"#).unwrap();
        assert_eq!(
            resp.into_checked("Registration failed").unwrap().message(),
            Some("User created")
        );
    }

    #[test]
    fn empty_query_sends_nothing() {
        assert!(StoriesQuery::default().pairs().is_empty());
        let q = StoriesQuery {
            page: Some(2),
            size: Some(10),
            location: Some(0),
        };
        assert_eq!(
            q.pairs(),
            vec![
                ("page", "2".to_string()),
                ("size", "10".to_string()),
                ("location", "0".to_string())
            ]
        );
    }
}
