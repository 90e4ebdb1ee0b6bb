//! Registration options

use serde::{Deserialize, Serialize};

/// Options consulted by the response stage of every registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterceptOptions {
    /// Skip `on_response_received` for 3xx responses
    #[serde(alias = "ignore_redirects")]
    pub ignore_redirects: bool,
    /// Skip `on_response_received` for 4xx responses
    #[serde(rename = "ignore4xxResponses", alias = "ignore_4xx_responses")]
    pub ignore_4xx_responses: bool,
}

impl InterceptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_redirects(mut self, ignore: bool) -> Self {
        self.ignore_redirects = ignore;
        self
    }

    pub fn ignore_4xx_responses(mut self, ignore: bool) -> Self {
        self.ignore_4xx_responses = ignore;
        self
    }

    /// Reason the response callback must be skipped for `status`, if any.
    pub(crate) fn skip_reason(&self, status: i64) -> Option<&'static str> {
        if self.ignore_redirects && (300..400).contains(&status) {
            Some("received redirect response")
        } else if self.ignore_4xx_responses && (400..500).contains(&status) {
            Some("received client error response")
        } else {
            None
        }
    }
}
