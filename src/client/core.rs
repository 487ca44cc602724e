// File: src/client/core.rs
use crate::client::error::{ApiError, Failure, classify};
use crate::client::wire::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, StoriesQuery,
    StoriesResponse, UploadForm, UploadResponse,
};
use crate::config::Config;
use crate::session::SessionStore;

use anyhow::Context;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

const REGISTER_PATH: &str = "register";
const LOGIN_PATH: &str = "login";
const STORIES_PATH: &str = "stories";

/// HTTP client for the Story API.
///
/// Authentication endpoints go out bare; every other call reads the current
/// token from the session store and carries it as a bearer credential. A call
/// that needs a token when none is stored fails with `ApiError::AuthRequired`
/// without touching the network.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

fn normalize_base(url: &str) -> anyhow::Result<Url> {
    let mut raw = url.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).with_context(|| format!("Invalid base URL '{}'", url))
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> anyhow::Result<Self> {
        let base_url = normalize_base(&config.base_url)?;
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::Unknown {
            message: format!("Invalid endpoint '{}': {}", path, e),
        })
    }

    async fn bearer_token(&self) -> Result<String, ApiError> {
        match self.session.token().await {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ApiError::AuthRequired),
        }
    }

    // --- AUTHENTICATION ---

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, ApiError> {
        let url = self.endpoint(REGISTER_PATH)?;
        let body = RegisterRequest {
            name,
            email,
            password,
        };
        self.execute(self.http.post(url).json(&body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let body = LoginRequest { email, password };
        self.execute(self.http.post(url).json(&body)).await
    }

    // --- STORIES ---

    pub async fn list_stories(&self, query: StoriesQuery) -> Result<StoriesResponse, ApiError> {
        let token = self.bearer_token().await?;
        let url = self.endpoint(STORIES_PATH)?;
        let request = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&query.pairs());
        self.execute(request).await
    }

    pub async fn upload_story(&self, form: UploadForm) -> Result<UploadResponse, ApiError> {
        let token = self.bearer_token().await?;
        let url = self.endpoint(STORIES_PATH)?;

        let photo = Part::bytes(form.photo)
            .file_name(form.file_name)
            .mime_str("image/jpeg")
            .map_err(|e| ApiError::Unknown {
                message: e.to_string(),
            })?;
        let mut multipart = Form::new()
            .text("description", form.description)
            .part("photo", photo);
        // Absent coordinates are left out of the form, not sent empty.
        if let Some(lat) = form.lat {
            multipart = multipart.text("lat", lat.to_string());
        }
        if let Some(lon) = form.lon {
            multipart = multipart.text("lon", lon.to_string());
        }

        let request = self.http.post(url).bearer_auth(token).multipart(multipart);
        self.execute(request).await
    }

    // --- EXCHANGE ---

    /// Send a request and decode its JSON body. Every failure path goes
    /// through `classify`.
    async fn execute<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ApiError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = classify(Failure::Transport(&e));
                log::warn!("Request failed before a response arrived: {} ({:?})", e, err);
                return Err(err);
            }
        };

        let status = response.status();
        let path = response.url().path().to_string();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) if !status.is_success() => {
                // The status is still known; only its body is lost.
                log::warn!("Failed to read error body from {}: {}", path, e);
                return Err(classify(Failure::Status {
                    code: status.as_u16(),
                    body: "",
                }));
            }
            Err(e) => {
                let err = classify(Failure::Transport(&e));
                log::warn!("Failed to read response body from {}: {}", path, e);
                return Err(err);
            }
        };

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let err = classify(Failure::Status {
                code: status.as_u16(),
                body: &text,
            });
            log::warn!("{} answered {}: {}", path, status.as_u16(), err);
            return Err(err);
        }

        log::debug!("{} answered {} ({} bytes)", path, status.as_u16(), body.len());
        serde_json::from_slice(&body).map_err(|e| {
            log::warn!("{} sent an undecodable body: {}", path, e);
            classify(Failure::Decode(&e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base("https://story-api.dicoding.dev/v1").unwrap();
        assert_eq!(
            url.join("stories").unwrap().as_str(),
            "https://story-api.dicoding.dev/v1/stories"
        );
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let err = normalize_base("not a url").unwrap_err();
        assert!(err.to_string().contains("Invalid base URL"));
    }
}
