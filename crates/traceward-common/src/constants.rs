//! System-wide constants and defaults.

/// Label key a container must carry to be traced when label filtering
/// is enabled.
pub const ENABLE_LABEL_KEY: &str = "traceward.io/enabled";

/// Label value that marks a container as enabled for tracing.
pub const ENABLE_LABEL_VALUE: &str = "true";

/// Default capacity of the ingestion queue, in events.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16_384;

/// Name under which the container discovery is reported in errors.
pub const DISCOVERY_COMPONENT: &str = "container_discovery";

/// Application name used in CLI output.
pub const APP_NAME: &str = "traceward";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "twd";
