// Crate root library declaration and module exports.
pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod event;
pub mod model;
pub mod paging;
pub mod result;
pub mod session;
pub mod storage;
pub mod stories;
pub mod validation;

pub use crate::app::StoryApp;
pub use crate::client::{ApiClient, ApiError};
pub use crate::model::{Story, StoryPage, UploadRequest};
pub use crate::result::NetworkResult;
