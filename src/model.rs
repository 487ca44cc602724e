// Domain types shared by the services and the paging engine.
use crate::paging::PageItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl Story {
    /// Coordinates are only trusted as a complete, in-range pair.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if is_valid_lat(lat) && is_valid_lon(lon) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn has_location(&self) -> bool {
        self.coordinates().is_some()
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl PageItem for Story {
    fn key(&self) -> &str {
        &self.id
    }
}

pub fn is_valid_lat(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn is_valid_lon(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

/// Server-side filter for the stories listing (`location` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationFilter {
    #[default]
    Any,
    WithLocation,
}

impl LocationFilter {
    pub fn as_query(self) -> u8 {
        match self {
            LocationFilter::Any => 0,
            LocationFilter::WithLocation => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryPage {
    pub message: String,
    pub page: u32,
    pub size: u32,
    pub stories: Vec<Story>,
}

impl StoryPage {
    /// An empty page marks the end of the feed.
    pub fn has_next(&self) -> bool {
        !self.stories.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub message: String,
    pub user_id: String,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub message: String,
}

/// A new story as composed on the device. Sent once, never retried.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image: Vec<u8>,
    pub file_name: String,
    pub description: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl UploadRequest {
    pub fn new(image: Vec<u8>, description: impl Into<String>) -> Self {
        Self {
            image,
            file_name: "photo.jpg".to_string(),
            description: description.into(),
            lat: None,
            lon: None,
        }
    }

    pub fn with_location(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }
}

/// Smallest box containing every located story, for framing a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn from_stories(stories: &[Story]) -> Option<Self> {
        let mut points = stories.iter().filter_map(Story::coordinates);
        let (lat, lon) = points.next()?;
        let mut bounds = GeoBounds {
            south: lat,
            west: lon,
            north: lat,
            east: lon,
        };
        for (lat, lon) in points {
            bounds.south = bounds.south.min(lat);
            bounds.north = bounds.north.max(lat);
            bounds.west = bounds.west.min(lon);
            bounds.east = bounds.east.max(lon);
        }
        Some(bounds)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: &str, lat: Option<f64>, lon: Option<f64>) -> Story {
        Story {
            id: id.to_string(),
            name: "Ann".to_string(),
            description: "desc".to_string(),
            photo_url: "https://example.com/p.jpg".to_string(),
            created_at: "2024-01-15T10:20:30.000Z".to_string(),
            lat,
            lon,
        }
    }

    #[test]
    fn half_coordinates_are_rejected() {
        assert_eq!(story("a", Some(1.0), None).coordinates(), None);
        assert_eq!(story("b", None, Some(1.0)).coordinates(), None);
        assert_eq!(story("c", Some(95.0), Some(1.0)).coordinates(), None);
        assert_eq!(
            story("d", Some(-6.2), Some(106.8)).coordinates(),
            Some((-6.2, 106.8))
        );
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = r#"{"id":"s-1","name":"Ann","description":"hi",
            "photoUrl":"https://x/y.jpg","createdAt":"2024-01-15T10:20:30.000Z","lat":-6.2,"lon":106.8}"#;
        let s: Story = serde_json::from_str(json).unwrap();
        assert_eq!(s.photo_url, "https://x/y.jpg");
        assert!(s.created_at_utc().is_some());
        assert!(s.has_location());
    }

    #[test]
    fn null_coordinates_deserialize_as_none() {
        let json = r#"{"id":"s-2","name":"Bo","description":"","photoUrl":"u",
            "createdAt":"bad","lat":null,"lon":null}"#;
        let s: Story = serde_json::from_str(json).unwrap();
        assert!(!s.has_location());
        assert!(s.created_at_utc().is_none());
    }

    #[test]
    fn bounds_cover_only_located_stories() {
        let stories = vec![
            story("a", Some(-6.0), Some(106.0)),
            story("b", None, None),
            story("c", Some(1.5), Some(103.0)),
            story("d", Some(10.0), None),
        ];
        let b = GeoBounds::from_stories(&stories).unwrap();
        assert_eq!(b.south, -6.0);
        assert_eq!(b.north, 1.5);
        assert_eq!(b.west, 103.0);
        assert_eq!(b.east, 106.0);
        assert!(GeoBounds::from_stories(&stories[1..2]).is_none());
    }
}
