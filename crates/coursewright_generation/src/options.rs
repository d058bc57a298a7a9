//! Per-request options and process-wide generation settings.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options chosen for one generation request.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct GenerationOptions {
    /// Run topic and lesson web research
    #[serde(default)]
    pub web_research: bool,
    /// Key for the research provider; the LLM key is used when absent
    #[serde(default)]
    #[setters(into)]
    pub research_api_key: Option<String>,
}

impl std::fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("web_research", &self.web_research)
            .field(
                "research_api_key",
                &self.research_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_reading_max_tokens() -> u32 {
    4_000
}

fn default_section_max_tokens() -> u32 {
    1_500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_structured_temperature() -> f32 {
    0.3
}

fn default_research_interval_ms() -> u64 {
    1_500
}

fn default_quiz_question_count() -> usize {
    10
}

/// Settings from the `[generation]` configuration section.
///
/// # Examples
///
/// ```
/// use coursewright_generation::GenerationSettings;
///
/// let settings = GenerationSettings::default().with_research_interval_ms(0);
/// assert_eq!(settings.model(), "gpt-4o-mini");
/// assert_eq!(*settings.quiz_question_count(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct GenerationSettings {
    /// Model for every completion
    #[serde(default = "default_model")]
    #[setters(into)]
    model: String,
    /// Token cap for a lesson's main reading
    #[serde(default = "default_reading_max_tokens")]
    reading_max_tokens: u32,
    /// Token cap for other sections
    #[serde(default = "default_section_max_tokens")]
    section_max_tokens: u32,
    /// Temperature for prose
    #[serde(default = "default_temperature")]
    temperature: f32,
    /// Temperature for JSON output
    #[serde(default = "default_structured_temperature")]
    structured_temperature: f32,
    /// Spacing between lesson-level research calls
    #[serde(default = "default_research_interval_ms")]
    research_interval_ms: u64,
    /// Questions requested and kept per quiz
    #[serde(default = "default_quiz_question_count")]
    quiz_question_count: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            reading_max_tokens: default_reading_max_tokens(),
            section_max_tokens: default_section_max_tokens(),
            temperature: default_temperature(),
            structured_temperature: default_structured_temperature(),
            research_interval_ms: default_research_interval_ms(),
            quiz_question_count: default_quiz_question_count(),
        }
    }
}

impl GenerationSettings {
    /// Research spacing as a duration.
    pub fn research_interval(&self) -> Duration {
        Duration::from_millis(self.research_interval_ms)
    }
}
