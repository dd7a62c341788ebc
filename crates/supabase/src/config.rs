use std::fmt::Debug;

const DEFAULT_CHAT_FUNCTION: &str = "document-chat";

/// Builder for [`SupabaseConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SupabaseConfigBuilder {
    anon_key: String,
    project_url: Option<String>,
    functions_url: Option<String>,
    rest_url: Option<String>,
    chat_function: Option<String>,
    access_token: Option<String>,
}

impl SupabaseConfigBuilder {
    /// Creates a builder with the given anonymous (public) API key.
    #[inline]
    pub fn with_anon_key<S: Into<String>>(anon_key: S) -> Self {
        Self {
            anon_key: anon_key.into(),
            project_url: None,
            functions_url: None,
            rest_url: None,
            chat_function: None,
            access_token: None,
        }
    }

    /// Sets the project URL, e.g. `https://xyz.supabase.co`. The functions
    /// and REST URLs are derived from it unless set explicitly.
    #[inline]
    pub fn with_project_url<S: Into<String>>(mut self, url: S) -> Self {
        self.project_url = Some(url.into());
        self
    }

    /// Sets the edge functions base URL. The chat function name is
    /// appended to it verbatim, so it should end with a slash.
    #[inline]
    pub fn with_functions_url<S: Into<String>>(mut self, url: S) -> Self {
        self.functions_url = Some(url.into());
        self
    }

    /// Sets the PostgREST base URL.
    #[inline]
    pub fn with_rest_url<S: Into<String>>(mut self, url: S) -> Self {
        self.rest_url = Some(url.into());
        self
    }

    /// Sets the name of the streaming chat function.
    #[inline]
    pub fn with_chat_function<S: Into<String>>(mut self, name: S) -> Self {
        self.chat_function = Some(name.into());
        self
    }

    /// Sets the signed-in user's access token, used for table reads.
    #[inline]
    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SupabaseConfig {
        let project_url = self
            .project_url
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| "http://localhost:54321".to_owned());
        SupabaseConfig {
            functions_url: self
                .functions_url
                .unwrap_or_else(|| format!("{project_url}/functions/v1/")),
            rest_url: self
                .rest_url
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| format!("{project_url}/rest/v1")),
            chat_function: self
                .chat_function
                .unwrap_or_else(|| DEFAULT_CHAT_FUNCTION.to_owned()),
            anon_key: self.anon_key,
            access_token: self.access_token,
        }
    }
}

impl Debug for SupabaseConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfigBuilder")
            .field("anon_key", &"<deducted>")
            .field("project_url", &self.project_url)
            .field("functions_url", &self.functions_url)
            .field("rest_url", &self.rest_url)
            .field("chat_function", &self.chat_function)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<deducted>"),
            )
            .finish()
    }
}

/// Configuration for the Supabase backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SupabaseConfig {
    pub(crate) anon_key: String,
    pub(crate) functions_url: String,
    pub(crate) rest_url: String,
    pub(crate) chat_function: String,
    pub(crate) access_token: Option<String>,
}

impl SupabaseConfig {
    /// Returns the full URL of the streaming chat function.
    #[inline]
    pub fn chat_url(&self) -> String {
        format!("{}{}", self.functions_url, self.chat_function)
    }

    /// Returns the PostgREST base URL.
    #[inline]
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    /// Bearer token for table reads: the user's token when signed in,
    /// the anonymous key otherwise.
    #[inline]
    pub(crate) fn table_bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }
}

impl Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("anon_key", &"<deducted>")
            .field("functions_url", &self.functions_url)
            .field("rest_url", &self.rest_url)
            .field("chat_function", &self.chat_function)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<deducted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_urls() {
        let config = SupabaseConfigBuilder::with_anon_key("anon")
            .with_project_url("https://xyz.supabase.co/")
            .build();
        assert_eq!(
            config.chat_url(),
            "https://xyz.supabase.co/functions/v1/document-chat"
        );
        assert_eq!(config.rest_url(), "https://xyz.supabase.co/rest/v1");
        assert_eq!(config.table_bearer(), "anon");
    }

    #[test]
    fn test_overrides_and_redaction() {
        let config = SupabaseConfigBuilder::with_anon_key("anon-secret")
            .with_functions_url("http://fn.local/")
            .with_rest_url("http://rest.local/")
            .with_chat_function("appeal-chat")
            .with_access_token("jwt-secret")
            .build();
        assert_eq!(config.chat_url(), "http://fn.local/appeal-chat");
        assert_eq!(config.rest_url(), "http://rest.local");
        assert_eq!(config.table_bearer(), "jwt-secret");

        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
    }
}
