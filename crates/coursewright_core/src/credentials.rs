//! LMS connection details.

use serde::{Deserialize, Serialize};

/// Which LMS dialect an adapter speaks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LmsType {
    /// Course → topic → lesson; quizzes hang off topics
    TopicBased,
    /// Course → section → lesson; quizzes hang off a section's first lesson
    SectionBased,
}

/// Credentials for an LMS instance.
///
/// `lms_type` is kept as supplied and only parsed when an adapter is built,
/// so that a typo surfaces as a descriptive configuration error.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LmsCredentials {
    /// Adapter variant, e.g. `topic_based`
    pub lms_type: String,
    /// Root URL of the LMS REST API
    pub base_url: String,
    /// Account name
    pub username: String,
    /// Account password or application password
    pub password: String,
}

impl std::fmt::Debug for LmsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmsCredentials")
            .field("lms_type", &self.lms_type)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
