//! LMS adapters.
//!
//! Two dialects sit behind [`coursewright_interface::LmsAdapter`]:
//!
//! | capability | [`TopicBasedLms`] | [`SectionBasedLms`] |
//! |---|---|---|
//! | mid-level container | topic | section |
//! | quiz attached to | topic | first lesson of the section |
//! | assignments | native entity | lesson of type `assignment` |
//!
//! [`HttpLmsConnector`] picks the dialect from the credentials' `lms_type`
//! and refuses anything it does not recognize.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod connector;
mod section_based;
mod topic_based;

pub use connector::HttpLmsConnector;
pub use section_based::SectionBasedLms;
pub use topic_based::TopicBasedLms;
