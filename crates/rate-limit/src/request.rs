//! Request information for rate limiting.

/// Identity attributes of a request that needs to be rate limited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitRequest {
    /// Client IP address as reported by the forwarding headers.
    pub ip: Option<String>,
    /// The `user-agent` header.
    pub user_agent: Option<String>,
    /// The `accept-language` header.
    pub accept_language: Option<String>,
}

impl RateLimitRequest {
    /// Create a new builder for a rate limit request.
    pub fn builder() -> RateLimitRequestBuilder {
        RateLimitRequestBuilder::default()
    }
}

/// Builder for creating rate limit requests.
///
/// Blank values are treated as missing, so they fall back to the shared unknown identity.
#[derive(Debug, Default)]
pub struct RateLimitRequestBuilder {
    ip: Option<String>,
    user_agent: Option<String>,
    accept_language: Option<String>,
}

impl RateLimitRequestBuilder {
    /// Set the client IP address.
    pub fn ip(mut self, ip: impl AsRef<str>) -> Self {
        self.ip = non_blank(ip.as_ref());
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl AsRef<str>) -> Self {
        self.user_agent = non_blank(user_agent.as_ref());
        self
    }

    /// Set the accepted languages.
    pub fn accept_language(mut self, accept_language: impl AsRef<str>) -> Self {
        self.accept_language = non_blank(accept_language.as_ref());
        self
    }

    /// Build the rate limit request.
    pub fn build(self) -> RateLimitRequest {
        RateLimitRequest {
            ip: self.ip,
            user_agent: self.user_agent,
            accept_language: self.accept_language,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
