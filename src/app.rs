// File: ./src/app.rs
//! Wires storage, session, HTTP client and services together.
//!
//! A host constructs one `StoryApp` per process and hands clones of the
//! services to whatever needs them. There is no global instance.
use crate::auth::AuthService;
use crate::cache::WidgetCache;
use crate::client::ApiClient;
use crate::config::Config;
use crate::context::SharedContext;
use crate::model::Story;
use crate::paging::{FeedSession, PagingConfig};
use crate::session::SessionStore;
use crate::storage::{FileKeyValueStore, KeyValueStore};
use crate::stories::StoryService;
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug)]
pub struct StoryApp {
    ctx: SharedContext,
    config: Config,
    session: Arc<SessionStore>,
    widget: WidgetCache,
    auth: AuthService,
    stories: StoryService,
}

impl StoryApp {
    /// Build with the session persisted under the context's data dir.
    pub fn new(ctx: SharedContext, config: Config) -> Result<Self> {
        let path = ctx.get_session_path()?;
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(path));
        Self::with_backend(ctx, config, backend)
    }

    /// Load the config from the context (defaults when absent) and build.
    pub fn open(ctx: SharedContext) -> Result<Self> {
        let config = Config::load_or_default(ctx.as_ref())?;
        Self::new(ctx, config)
    }

    pub fn with_backend(
        ctx: SharedContext,
        config: Config,
        backend: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let session = Arc::new(SessionStore::open(backend)?);
        let api = ApiClient::new(&config, session.clone())?;
        let widget = WidgetCache::new(ctx.as_ref());
        let auth = AuthService::new(api.clone(), session.clone());
        let stories = StoryService::new(api, &config).with_widget_cache(widget.clone());
        log::debug!("Story client ready against {}", config.base_url);
        Ok(Self {
            ctx,
            config,
            session,
            widget,
            auth,
            stories,
        })
    }

    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn stories(&self) -> &StoryService {
        &self.stories
    }

    pub fn widget(&self) -> &WidgetCache {
        &self.widget
    }

    /// Paged home feed. Must be called inside a tokio runtime.
    pub fn feed(&self) -> FeedSession<Story> {
        FeedSession::spawn(
            self.stories.clone(),
            PagingConfig::incremental(self.config.initial_page_index, self.config.page_size),
        )
    }

    /// Everything in one request, replaced wholesale on refresh.
    pub fn all_stories_feed(&self) -> FeedSession<Story> {
        FeedSession::spawn(self.stories.clone(), PagingConfig::replace_all())
    }
}
