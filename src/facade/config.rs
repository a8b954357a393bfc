use std::path::{Path, PathBuf};

/// Store configuration
///
/// Built with chained setters:
///
/// ```
/// use touchdb::StoreConfig;
///
/// let config = StoreConfig::new("~/.local/share/app/users.json")
///     .auto_dump(true)
///     .install_signal_handler(false)
///     .pretty(false);
/// assert!(config.auto_dump);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backing file; a leading `~` is expanded on open
    pub path: PathBuf,

    /// Persist after every mutating operation
    pub auto_dump: bool,

    /// Delay SIGTERM/SIGINT exit until in-flight dumps finish
    pub install_signal_handler: bool,

    /// Indent the backing file (four spaces) instead of writing compact JSON
    pub pretty: bool,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            auto_dump: false,
            install_signal_handler: true,
            pretty: true,
        }
    }

    pub fn auto_dump(mut self, enabled: bool) -> Self {
        self.auto_dump = enabled;
        self
    }

    pub fn install_signal_handler(mut self, enabled: bool) -> Self {
        self.install_signal_handler = enabled;
        self
    }

    pub fn pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }
}
