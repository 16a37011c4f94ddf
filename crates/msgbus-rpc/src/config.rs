use std::time::Duration;

use msgbus_frame::FrameConfig;

/// Default deadline applied by `call` when the caller gives none.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Controls invocation router behavior.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Name used in logs and thread names.
    pub name: String,
    /// Deadline used by `call`.
    pub call_timeout: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            name: "msgbus".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Everything a connection needs: framing limits plus router settings.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub frame: FrameConfig,
    pub invoker: InvokerConfig,
}
