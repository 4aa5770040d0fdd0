//! Configuration for the mastering layer. Everything is passed explicitly;
//! there are no process-wide singletons.

/// Tuning and secrets for a [`crate::Rollbook`] instance.
#[derive(Debug, Clone)]
pub struct RollbookConfig {
    /// Secret salt mixed into the national-id hash. Sourced from process
    /// configuration by the embedding application.
    pub national_id_salt: String,
    /// Upper bound on documents considered by the broad identity scan.
    pub scan_limit: usize,
}

impl RollbookConfig {
    /// Build a config with the given salt and default tuning.
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self {
            national_id_salt: salt.into(),
            ..Self::default()
        }
    }
}

impl Default for RollbookConfig {
    fn default() -> Self {
        Self {
            national_id_salt: String::new(),
            scan_limit: 64,
        }
    }
}
