//! Variant selection.

use crate::client::LmsClient;
use crate::{SectionBasedLms, TopicBasedLms};
use coursewright_core::{LmsCredentials, LmsType};
use coursewright_error::{LmsError, LmsErrorKind};
use coursewright_interface::{LmsAdapter, LmsConnector};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Builds HTTP adapters from credentials.
#[derive(Debug, Clone)]
pub struct HttpLmsConnector {
    timeout: Duration,
}

impl HttpLmsConnector {
    /// Connector whose clients use `timeout` per request.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpLmsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl LmsConnector for HttpLmsConnector {
    #[instrument(skip(self, credentials), fields(lms_type = %credentials.lms_type))]
    fn connect(&self, credentials: &LmsCredentials) -> Result<Arc<dyn LmsAdapter>, LmsError> {
        let lms_type = LmsType::from_str(credentials.lms_type.trim())
            .map_err(|_| LmsError::new(LmsErrorKind::UnknownVariant(credentials.lms_type.clone())))?;
        let client = LmsClient::new(credentials, self.timeout)?;
        debug!(%lms_type, "Connected LMS adapter");
        Ok(match lms_type {
            LmsType::TopicBased => Arc::new(TopicBasedLms::new(client)),
            LmsType::SectionBased => Arc::new(SectionBasedLms::new(client)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(lms_type: &str, base_url: &str) -> LmsCredentials {
        LmsCredentials {
            lms_type: lms_type.into(),
            base_url: base_url.into(),
            username: "author".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn selects_variant_by_type() {
        let connector = HttpLmsConnector::default();
        let a = connector.connect(&creds("topic_based", "https://a.example")).unwrap();
        let b = connector.connect(&creds("section_based", "https://b.example")).unwrap();
        assert_eq!(a.lms_type(), LmsType::TopicBased);
        assert_eq!(b.lms_type(), LmsType::SectionBased);
    }

    #[test]
    fn unknown_type_fails_fast_with_descriptive_error() {
        let err = HttpLmsConnector::default()
            .connect(&creds("blackboard", "https://a.example"))
            .err()
            .expect("unknown variant must fail");
        assert!(matches!(err.kind, LmsErrorKind::UnknownVariant(ref v) if v == "blackboard"));
        assert!(err.to_string().contains("topic_based"));
    }

    #[test]
    fn invalid_url_fails_fast() {
        let err = HttpLmsConnector::default()
            .connect(&creds("topic_based", "lms.example.com"))
            .err()
            .expect("relative URL must fail");
        assert!(matches!(err.kind, LmsErrorKind::InvalidBaseUrl { .. }));
    }
}
