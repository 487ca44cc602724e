// Register, login and logout workflows on top of the API client and the
// session store.
use crate::client::wire::Envelope;
use crate::client::{ApiClient, ApiError};
use crate::model::{LoginOutcome, RegisterOutcome};
use crate::result::NetworkResult;
use crate::session::{Session, SessionStore};
use crate::validation::{validate_email, validate_name, validate_password};
use std::sync::Arc;
use tokio::sync::watch;

const REGISTER_FAILED: &str = "Registration failed";
const LOGIN_FAILED: &str = "Login failed";

#[derive(Clone, Debug)]
pub struct AuthService {
    api: ApiClient,
    session: Arc<SessionStore>,
}

impl AuthService {
    pub fn new(api: ApiClient, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> NetworkResult<RegisterOutcome> {
        self.register_inner(name, email, password).await.into()
    }

    async fn register_inner(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterOutcome, ApiError> {
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;

        let resp = self
            .api
            .register(name, email, password)
            .await?
            .into_checked(REGISTER_FAILED)?;
        log::info!("Registered account for {}", email);
        Ok(RegisterOutcome {
            message: resp.message.unwrap_or_default(),
        })
    }

    /// On success the session has already been persisted when this returns.
    pub async fn login(&self, email: &str, password: &str) -> NetworkResult<LoginOutcome> {
        self.login_inner(email, password).await.into()
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        validate_email(email)?;
        validate_password(password)?;

        let resp = self.api.login(email, password).await?.into_checked(LOGIN_FAILED)?;
        let Some(result) = resp.login_result else {
            log::warn!("Login for {} succeeded without credentials", email);
            return Err(ApiError::Unknown {
                message: LOGIN_FAILED.to_string(),
            });
        };

        self.session
            .save_session(&result.token, &result.user_id, &result.name)
            .await
            .map_err(|e| {
                log::error!("Failed to persist session: {:#}", e);
                ApiError::Unknown {
                    message: format!("Could not save your session: {}", e),
                }
            })?;
        log::info!("Logged in as {}", result.user_id);

        Ok(LoginOutcome {
            message: resp.message.unwrap_or_default(),
            user_id: result.user_id,
            name: result.name,
            token: result.token,
        })
    }

    /// Local only. Persistence failures are logged, never surfaced.
    pub async fn logout(&self) {
        if let Err(e) = self.session.clear().await {
            log::error!("Failed to clear session: {:#}", e);
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.session.token().await
    }

    pub async fn user_id(&self) -> Option<String> {
        self.session.user_id().await
    }

    pub async fn user_name(&self) -> Option<String> {
        self.session.user_name().await
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }
}
