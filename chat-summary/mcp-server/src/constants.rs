//! Constants and configuration values used throughout the chat summary server

/// URI scheme of the virtual summary documents
pub const SUMMARY_SCHEME: &str = "chat-session-summary";

/// Name of the prompt variable that expands to a session summary
pub const SUMMARY_VARIABLE: &str = "session-summary";

/// Mime type reported for summary documents
pub const SUMMARY_MIME_TYPE: &str = "text/markdown";

/// Directory for temporary files (logs)
pub const TEMP_DIR: &str = "/tmp";

/// Default log file name for development mode
pub const DEV_LOG_FILENAME: &str = "chat-summary-mcp.log";

/// Default upper bound on summary length, in model tokens
pub const DEFAULT_MAX_SUMMARY_TOKENS: u32 = 1024;

/// Default number of most recent exchanges included in the summary prompt
pub const DEFAULT_MAX_EXCHANGES: usize = 50;

/// Development log file path
pub fn dev_log_path() -> String {
    format!("{}/{}", TEMP_DIR, DEV_LOG_FILENAME)
}
