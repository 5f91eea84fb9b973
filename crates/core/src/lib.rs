pub mod analysis;
pub mod domain;
pub mod extract;
pub mod llm;

pub mod config {
    #[derive(Clone)]
    pub struct Settings {
        pub google_api_key: Option<String>,
        pub gemini_model: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl std::fmt::Debug for Settings {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Settings")
                .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
                .field("gemini_model", &self.gemini_model)
                .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "<redacted>"))
                .finish()
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                google_api_key: non_empty_var("GOOGLE_API_KEY"),
                gemini_model: non_empty_var("GEMINI_MODEL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn model_or_default(&self) -> &str {
            self.gemini_model
                .as_deref()
                .unwrap_or(crate::analysis::DEFAULT_MODEL)
        }
    }

    fn non_empty_var(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|s| !s.trim().is_empty())
    }
}
