// Snapshot of the latest stories for the home-screen widget.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to the Story struct require incrementing SNAPSHOT_VERSION below so
// stale snapshots are discarded instead of misread.
use crate::context::AppContext;
use crate::model::Story;
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const SNAPSHOT_VERSION: u32 = 1;

/// How many stories the widget shows.
pub const WIDGET_STORY_COUNT: usize = 10;

pub const PLACEHOLDER_ID: &str = "placeholder";

#[derive(Serialize, Deserialize)]
struct WidgetSnapshotFile {
    // Missing in files written before versioning; reads as 0.
    #[serde(default)]
    version: u32,
    saved_at: String,
    stories: Vec<Story>,
}

#[derive(Debug, Clone)]
pub struct WidgetCache {
    path: Option<PathBuf>,
}

impl WidgetCache {
    pub fn new(ctx: &dyn AppContext) -> Self {
        Self {
            path: ctx.get_widget_snapshot_path(),
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Keep the first `WIDGET_STORY_COUNT` stories.
    pub fn save_latest(&self, stories: &[Story]) -> Result<()> {
        if let Some(path) = &self.path {
            let data = WidgetSnapshotFile {
                version: SNAPSHOT_VERSION,
                saved_at: chrono::Utc::now().to_rfc3339(),
                stories: stories.iter().take(WIDGET_STORY_COUNT).cloned().collect(),
            };
            LocalStorage::with_lock(path, || {
                let json = serde_json::to_string_pretty(&data)?;
                LocalStorage::atomic_write(path, json)?;
                Ok(())
            })?;
            log::debug!("Widget snapshot updated with {} stories", data.stories.len());
        }
        Ok(())
    }

    /// Stored stories, or an empty list when nothing usable is cached.
    pub fn load_raw(&self) -> Result<Vec<Story>> {
        if let Some(path) = &self.path
            && path.exists()
        {
            return LocalStorage::with_lock(path, || {
                let json = fs::read_to_string(path)?;
                match serde_json::from_str::<WidgetSnapshotFile>(&json) {
                    Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Ok(snapshot.stories),
                    Ok(snapshot) => {
                        log::info!(
                            "Discarding widget snapshot version {} (expected {})",
                            snapshot.version,
                            SNAPSHOT_VERSION
                        );
                        Ok(vec![])
                    }
                    Err(e) => {
                        log::warn!("Unreadable widget snapshot {:?}: {}", path, e);
                        Ok(vec![])
                    }
                }
            });
        }
        Ok(vec![])
    }

    /// What the widget renders: the stored stories, or a single placeholder.
    pub fn load(&self) -> Result<Vec<Story>> {
        let stories = self.load_raw()?;
        if stories.is_empty() {
            return Ok(vec![placeholder_story()]);
        }
        Ok(stories)
    }
}

pub fn placeholder_story() -> Story {
    Story {
        id: PLACEHOLDER_ID.to_string(),
        name: "Story App".to_string(),
        description: "No stories yet".to_string(),
        photo_url: String::new(),
        created_at: String::new(),
        lat: None,
        lon: None,
    }
}
