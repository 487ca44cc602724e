// Story listing, map queries and uploads.
use crate::cache::WidgetCache;
use crate::client::wire::{Envelope, StoriesQuery, UploadForm};
use crate::client::{ApiClient, ApiError};
use crate::config::Config;
use crate::model::{LocationFilter, Story, StoryPage, UploadOutcome, UploadRequest};
use crate::paging::{PageFetcher, PageRequest};
use crate::result::NetworkResult;
use crate::validation::validate_upload;
use futures::future::BoxFuture;

const LOAD_FAILED: &str = "Failed to load stories";
const UPLOAD_FAILED: &str = "Upload failed";

#[derive(Clone, Debug)]
pub struct StoryService {
    api: ApiClient,
    initial_page: u32,
    widget: Option<WidgetCache>,
}

impl StoryService {
    pub fn new(api: ApiClient, config: &Config) -> Self {
        Self {
            api,
            initial_page: config.initial_page_index,
            widget: None,
        }
    }

    /// Successful loads of the first page (or of everything) also refresh
    /// this widget snapshot.
    pub fn with_widget_cache(mut self, cache: WidgetCache) -> Self {
        self.widget = Some(cache);
        self
    }

    pub async fn get_stories(
        &self,
        page: u32,
        size: u32,
        filter: LocationFilter,
    ) -> NetworkResult<StoryPage> {
        self.get_stories_inner(page, size, filter).await.into()
    }

    async fn get_stories_inner(
        &self,
        page: u32,
        size: u32,
        filter: LocationFilter,
    ) -> Result<StoryPage, ApiError> {
        if size == 0 {
            return Err(ApiError::validation(
                "size",
                "Page size must be greater than zero",
            ));
        }
        let query = StoriesQuery {
            page: Some(page),
            size: Some(size),
            location: Some(filter.as_query()),
        };
        let resp = self.api.list_stories(query).await?.into_checked(LOAD_FAILED)?;
        log::debug!("Loaded page {} with {} stories", page, resp.list_story.len());

        if page == self.initial_page && filter == LocationFilter::Any {
            self.refresh_widget(&resp.list_story).await;
        }
        Ok(StoryPage {
            message: resp.message.unwrap_or_default(),
            page,
            size,
            stories: resp.list_story,
        })
    }

    /// One request at the server's default size.
    pub async fn get_all_stories(&self) -> NetworkResult<Vec<Story>> {
        self.get_all_stories_inner().await.into()
    }

    async fn get_all_stories_inner(&self) -> Result<Vec<Story>, ApiError> {
        let resp = self
            .api
            .list_stories(StoriesQuery::default())
            .await?
            .into_checked(LOAD_FAILED)?;
        self.refresh_widget(&resp.list_story).await;
        Ok(resp.list_story)
    }

    /// Stories for the map: asks the server for located stories, then keeps
    /// only those with a usable coordinate pair.
    pub async fn stories_with_location(&self, limit: u32) -> NetworkResult<Vec<Story>> {
        self.stories_with_location_inner(limit).await.into()
    }

    async fn stories_with_location_inner(&self, limit: u32) -> Result<Vec<Story>, ApiError> {
        let query = StoriesQuery {
            page: Some(self.initial_page),
            size: Some(limit.max(1)),
            location: Some(LocationFilter::WithLocation.as_query()),
        };
        let resp = self.api.list_stories(query).await?.into_checked(LOAD_FAILED)?;
        let total = resp.list_story.len();
        let located: Vec<Story> = resp
            .list_story
            .into_iter()
            .filter(Story::has_location)
            .collect();
        if located.len() < total {
            log::debug!(
                "Dropped {} stories without a valid location",
                total - located.len()
            );
        }
        Ok(located)
    }

    /// Sent exactly once; a failure is reported, never retried.
    pub async fn upload_story(&self, request: UploadRequest) -> NetworkResult<UploadOutcome> {
        self.upload_story_inner(request).await.into()
    }

    async fn upload_story_inner(&self, request: UploadRequest) -> Result<UploadOutcome, ApiError> {
        validate_upload(&request)?;

        let size = request.image.len();
        let form = UploadForm {
            description: request.description,
            photo: request.image,
            file_name: request.file_name,
            lat: request.lat,
            lon: request.lon,
        };
        let resp = self.api.upload_story(form).await?.into_checked(UPLOAD_FAILED)?;
        log::info!("Uploaded story ({} bytes)", size);
        Ok(UploadOutcome {
            message: resp.message.unwrap_or_default(),
        })
    }

    async fn refresh_widget(&self, stories: &[Story]) {
        let Some(cache) = self.widget.clone() else {
            return;
        };
        let stories = stories.to_vec();
        match tokio::task::spawn_blocking(move || cache.save_latest(&stories)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to update widget snapshot: {:#}", e),
            Err(e) => log::warn!("Widget snapshot task failed: {}", e),
        }
    }
}

impl PageFetcher<Story> for StoryService {
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, NetworkResult<Vec<Story>>> {
        let service = self.clone();
        Box::pin(async move {
            match request.size {
                Some(size) => service
                    .get_stories(request.index, size, LocationFilter::Any)
                    .await
                    .map(|page| page.stories),
                None => service.get_all_stories().await,
            }
        })
    }
}
