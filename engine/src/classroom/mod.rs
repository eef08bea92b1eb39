//! Course Provider Client
//!
//! Read-only accessor over a Classroom-style REST catalog. The
//! `CourseProvider` trait is the seam the reconciler and the HTTP layer
//! depend on; `ClassroomClient` is the production implementation backed by
//! reqwest with a bounded timeout and transparent access-token refresh.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod auth;

pub use auth::{Credentials, TokenCache};

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ClassroomError>;

/// Errors that can occur talking to the course provider
#[derive(Debug, thiserror::Error)]
pub enum ClassroomError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClassroomError {
    /// Whether the reconciler should treat this as a transient fetch
    /// failure (abort the pass, retry on the next tick).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Auth(_))
    }
}

/// A course as exposed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// One coursework entry for a course
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Read-only remote course catalog
///
/// Implementations must be safe to call concurrently; every reconciler
/// pass and request handler shares one instance.
#[async_trait]
pub trait CourseProvider: Send + Sync {
    /// Fetch a single course by id
    async fn get_course(&self, course_id: &str) -> Result<Course>;

    /// List the coursework of a course
    async fn list_coursework(&self, course_id: &str) -> Result<Vec<Assignment>>;

    /// Enumerate all courses visible to the configured identity
    ///
    /// Used by the listing endpoint and the `courses` CLI command, not by
    /// the reconciler.
    async fn list_courses(&self) -> Result<Vec<Course>>;
}

/// Production client for a Classroom-style REST API
pub struct ClassroomClient {
    base_url: String,
    tokens: Arc<TokenCache>,
    client: reqwest::Client,
}

impl ClassroomClient {
    /// Create a new client
    ///
    /// `base_url` is the API root (e.g. "https://classroom.googleapis.com").
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            base_url: base_url.into(),
            tokens,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassroomError::Unavailable(format!("Request to {} timed out", url))
                } else if e.is_connect() {
                    ClassroomError::Unavailable(format!("Cannot connect to {}", self.base_url))
                } else {
                    ClassroomError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => ClassroomError::Auth(text),
                404 => ClassroomError::NotFound(what.to_string()),
                _ => ClassroomError::Unavailable(format!("Provider error ({}): {}", status, text)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClassroomError::Parse(format!("Failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl CourseProvider for ClassroomClient {
    async fn get_course(&self, course_id: &str) -> Result<Course> {
        let url = format!("{}/v1/courses/{}", self.base_url, course_id);
        self.get_json(&url, &format!("course {}", course_id)).await
    }

    async fn list_coursework(&self, course_id: &str) -> Result<Vec<Assignment>> {
        let url = format!("{}/v1/courses/{}/courseWork", self.base_url, course_id);
        let listing: CourseworkListing = self
            .get_json(&url, &format!("coursework of {}", course_id))
            .await?;
        Ok(listing.course_work)
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let url = format!("{}/v1/courses", self.base_url);
        let listing: CourseListing = self.get_json(&url, "course list").await?;
        Ok(listing.courses)
    }
}

/// Wire format of the coursework listing
///
/// The provider omits the field entirely for courses with no coursework.
#[derive(Debug, Deserialize)]
struct CourseworkListing {
    #[serde(default, rename = "courseWork")]
    course_work: Vec<Assignment>,
}

/// Wire format of the course listing
#[derive(Debug, Deserialize)]
struct CourseListing {
    #[serde(default)]
    courses: Vec<Course>,
}
