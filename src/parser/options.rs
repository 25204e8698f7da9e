//! Loading options and configuration.

/// Options for loading PDF documents.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Password for encrypted documents
    pub password: Option<String>,
}

impl LoadOptions {
    /// Create new load options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Rebuild damaged cross-reference data instead of failing.
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Fail on any structural damage.
    pub fn strict(mut self) -> Self {
        self.error_mode = ErrorMode::Strict;
        self
    }

    /// Enable or disable xref recovery.
    pub fn with_recovery(self, recover: bool) -> Self {
        if recover {
            self.lenient()
        } else {
            self.strict()
        }
    }

    /// Set password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Whether damaged documents should be repaired.
    pub fn recovery_enabled(&self) -> bool {
        self.error_mode == ErrorMode::Lenient
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Lenient,
            password: None,
        }
    }
}

/// Error handling mode during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any structural error
    Strict,
    /// Repair what can be repaired and continue
    #[default]
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_options_builder() {
        let options = LoadOptions::new().strict().with_password("secret");

        assert_eq!(options.error_mode, ErrorMode::Strict);
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert!(!options.recovery_enabled());
    }

    #[test]
    fn test_default_options() {
        let options = LoadOptions::default();
        assert_eq!(options.error_mode, ErrorMode::Lenient);
        assert!(options.recovery_enabled());
        assert!(options.password.is_none());
    }

    #[test]
    fn test_with_recovery_toggles_mode() {
        assert!(!LoadOptions::new().with_recovery(false).recovery_enabled());
        assert!(LoadOptions::new().strict().with_recovery(true).recovery_enabled());
    }
}
