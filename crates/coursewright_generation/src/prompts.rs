//! Prompt construction.
//!
//! Each step has its own system prompt; the user prompt carries the course,
//! topic and lesson context plus any web research gathered for them.

use coursewright_core::{Course, Lesson, Topic};

/// System prompt for the course overview.
pub const COURSE_CONTEXT_SYSTEM: &str = "You are an instructional designer. Write a concise \
overview of the course that later lessons can build on: audience, scope, prerequisites and the \
through-line connecting the topics.";

/// System prompt for topic introductions.
pub const TOPIC_INTRO_SYSTEM: &str = "You are an instructional designer. Write a short \
introduction for a course topic in HTML paragraphs.";

/// System prompt for a lesson's main reading.
pub const READING_SYSTEM: &str = "You are an expert educator. Write the main reading for a \
lesson as well-structured HTML using h2, h3, p, ul and li elements. Do not include html, head \
or body tags.";

/// System prompt for the FAQ section.
pub const FAQ_SYSTEM: &str = "You are an expert educator. Write a frequently-asked-questions \
section for the lesson as HTML, with each question in an h3 followed by its answer.";

/// System prompt for the latest developments section.
pub const LATEST_DEVELOPMENTS_SYSTEM: &str = "You are an industry analyst. Summarize recent \
developments relevant to the lesson as short HTML paragraphs.";

/// System prompt for the additional reading section.
pub const ADDITIONAL_READING_SYSTEM: &str = "You are a librarian. Recommend further reading \
for the lesson as an HTML list with one sentence on why each item is useful.";

/// System prompt for the slide outline.
pub const SLIDES_SYSTEM: &str = "You are a presentation designer. Produce a slide outline for \
the lesson: numbered slides, each with a title and three to five bullet points, in plain text.";

/// System prompt for the voice-over script.
pub const VOICE_OVER_SYSTEM: &str = "You are a narrator. Write a voice-over script for the \
lesson's slides in plain text, one paragraph per slide.";

/// System prompt for quiz questions.
pub const QUIZ_SYSTEM: &str = "You write assessment items. Respond with JSON only.";

/// System prompt for the topic assignment.
pub const ASSIGNMENT_SYSTEM: &str = "You design practical assignments. Respond with JSON only.";

/// The five sections generated after a lesson's reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LessonSection {
    /// Frequently asked questions
    Faq,
    /// Latest developments
    LatestDevelopments,
    /// Additional reading
    AdditionalReading,
    /// Slide outline
    Slides,
    /// Voice-over script
    VoiceOver,
}

impl LessonSection {
    /// Sections in generation order.
    pub const ALL: [LessonSection; 5] = [
        LessonSection::Faq,
        LessonSection::LatestDevelopments,
        LessonSection::AdditionalReading,
        LessonSection::Slides,
        LessonSection::VoiceOver,
    ];

    /// System prompt for this section.
    pub fn system_prompt(self) -> &'static str {
        match self {
            LessonSection::Faq => FAQ_SYSTEM,
            LessonSection::LatestDevelopments => LATEST_DEVELOPMENTS_SYSTEM,
            LessonSection::AdditionalReading => ADDITIONAL_READING_SYSTEM,
            LessonSection::Slides => SLIDES_SYSTEM,
            LessonSection::VoiceOver => VOICE_OVER_SYSTEM,
        }
    }

    /// Label shown while the section is generated.
    pub fn label(self) -> &'static str {
        match self {
            LessonSection::Faq => "FAQ",
            LessonSection::LatestDevelopments => "Latest developments",
            LessonSection::AdditionalReading => "Additional reading",
            LessonSection::Slides => "Slides",
            LessonSection::VoiceOver => "Voice-over",
        }
    }
}

fn push_context(prompt: &mut String, heading: &str, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        prompt.push_str(&format!("\n\n{}:\n{}", heading, text));
    }
}

/// Course overview request.
pub fn course_context(course: &Course) -> String {
    let mut prompt = format!(
        "Course: {}\nDescription: {}\n\nTopics:",
        course.title, course.description
    );
    for (i, topic) in course.topics.iter().enumerate() {
        prompt.push_str(&format!("\n{}. {} ({})", i + 1, topic.title, topic.learning_objective));
        for lesson in &topic.lessons {
            prompt.push_str(&format!("\n   - {}", lesson.title));
        }
    }
    prompt
}

/// Topic introduction request.
pub fn topic_intro(course_context: &str, topic: &Topic, web_context: &str) -> String {
    let mut prompt = format!(
        "Topic: {}\nLearning objective: {}",
        topic.title, topic.learning_objective
    );
    if let Some(extra) = &topic.additional_context {
        push_context(&mut prompt, "Additional context", extra);
    }
    push_context(&mut prompt, "Course overview", course_context);
    push_context(&mut prompt, "Current web context", web_context);
    prompt
}

/// Inputs shared by every lesson-level prompt.
#[derive(Debug, Clone, Copy)]
pub struct LessonPrompt<'a> {
    /// Course overview text
    pub course_context: &'a str,
    /// Topic the lesson belongs to
    pub topic: &'a Topic,
    /// Cached topic introduction
    pub topic_intro: &'a str,
    /// The lesson
    pub lesson: &'a Lesson,
    /// Topic and lesson web research, joined
    pub web_context: &'a str,
}

impl LessonPrompt<'_> {
    fn base(&self) -> String {
        let mut prompt = format!(
            "Topic: {}\nLesson: {}\nLesson description: {}",
            self.topic.title, self.lesson.title, self.lesson.description
        );
        if let Some(extra) = &self.lesson.additional_context {
            push_context(&mut prompt, "Additional context", extra);
        }
        push_context(&mut prompt, "Course overview", self.course_context);
        push_context(&mut prompt, "Topic introduction", self.topic_intro);
        push_context(&mut prompt, "Current web context", self.web_context);
        prompt
    }

    /// Main reading request. With `use_retrieval` the model is told to ground
    /// the reading in the attached knowledge library.
    pub fn reading(&self, use_retrieval: bool) -> String {
        let mut prompt = self.base();
        prompt.push_str("\n\nWrite the main reading for this lesson.");
        if use_retrieval {
            prompt.push_str(
                " Ground the reading in the documents available through file search and prefer \
                 their terminology and examples.",
            );
        }
        prompt
    }

    /// Request for one of the follow-up sections, given the reading as plain text.
    pub fn section(&self, section: LessonSection, reading_plain: &str) -> String {
        let mut prompt = self.base();
        push_context(&mut prompt, "Lesson reading", reading_plain);
        prompt.push_str(&format!("\n\nWrite the {} section for this lesson.", section.label()));
        prompt
    }

    /// Narrow web research query for the lesson.
    pub fn research_query(&self) -> String {
        format!(
            "Recent developments, examples and sources about \"{}\" in the context of {}.",
            self.lesson.title, self.topic.title
        )
    }
}

/// Topic-level web research query.
pub fn topic_research_query(course: &Course, topic: &Topic) -> String {
    format!(
        "Current state, recent developments and authoritative sources on \"{}\" for a course on {}.",
        topic.title, course.title
    )
}

/// Quiz question request over the topic's lesson text.
pub fn quiz_questions(topic: &Topic, lesson_text: &str, count: usize) -> String {
    format!(
        "Write {count} quiz questions for the topic \"{title}\" using only the material below. \
Mix multiple_choice, single_choice and fill_in_blank questions.\n\
Return JSON: {{\"questions\": [{{\"type\": \"multiple_choice\", \"question\": \"...\", \
\"options\": [\"...\"], \"correct\": [0, 2]}}, {{\"type\": \"single_choice\", \"question\": \"...\", \
\"options\": [\"...\"], \"correct\": 1}}, {{\"type\": \"fill_in_blank\", \"question\": \"... ___ ...\", \
\"answers\": [\"...\"]}}]}}\n\nMaterial:\n{text}",
        count = count,
        title = topic.title,
        text = lesson_text
    )
}

/// Assignment request over the topic's lesson text.
pub fn assignment(topic: &Topic, lesson_text: &str) -> String {
    format!(
        "Design one practical assignment for the topic \"{}\" based only on the material below.\n\
Return JSON: {{\"title\": \"...\", \"content\": \"HTML instructions and grading criteria\"}}\n\n\
Material:\n{}",
        topic.title, lesson_text
    )
}
