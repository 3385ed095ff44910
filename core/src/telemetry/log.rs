use log::{debug, info, warn};

/// Component-scoped front for the `log` macros.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    target: &'static str,
}

impl LogManager {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "{}", message);
    }

    pub fn detail(&self, message: &str) {
        debug!(target: self.target, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.target, "{}", message);
    }

    /// Logs the 1st and every `every`-th occurrence at warn, the rest at debug.
    pub fn warn_throttled(&self, occurrence: u64, every: u64, message: &str) {
        if occurrence == 1 || (every > 0 && occurrence % every == 0) {
            self.warn(&format!("{} (occurrence {})", message, occurrence));
        } else {
            self.detail(message);
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("obstaclecore")
    }
}
