//! Chat Summary MCP Server Library
//!
//! Summarizes IDE chat sessions with the client's model and exposes the
//! summaries as shared, editable `chat-session-summary:` documents.

pub mod constants;
pub mod resource_resolver;
pub mod sampling;
mod server;
pub mod session_store;
pub mod structured_logging;
pub mod summaries;
pub mod summary_agent;
pub mod types;
pub mod variable;

// Re-export Options for use in main.rs
pub use crate::main_types::Options;

mod main_types {
    use clap::Parser;

    use crate::constants::{DEFAULT_MAX_EXCHANGES, DEFAULT_MAX_SUMMARY_TOKENS};
    use crate::summary_agent::SummaryAgentConfig;

    #[derive(Parser, Debug, Clone)]
    pub struct Options {
        /// Enable development logging to the default log file
        #[arg(long, global = true)]
        pub dev_log: bool,

        /// Upper bound on the length of a summary, in model tokens
        #[arg(
            long,
            global = true,
            default_value_t = DEFAULT_MAX_SUMMARY_TOKENS,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        pub max_tokens: u32,

        /// Number of most recent exchanges sent to the model
        #[arg(
            long,
            global = true,
            default_value_t = DEFAULT_MAX_EXCHANGES,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        pub max_exchanges: usize,
    }

    impl Options {
        pub fn summary_config(&self) -> SummaryAgentConfig {
            SummaryAgentConfig {
                max_tokens: self.max_tokens,
                max_exchanges: self.max_exchanges,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let options = Options::try_parse_from(["chat-summary-mcp"]).unwrap();
            assert!(!options.dev_log);
            assert_eq!(options.summary_config(), SummaryAgentConfig::default());
        }

        #[test]
        fn test_zero_limits_are_rejected() {
            assert!(Options::try_parse_from(["chat-summary-mcp", "--max-exchanges", "0"]).is_err());
            assert!(Options::try_parse_from(["chat-summary-mcp", "--max-tokens", "0"]).is_err());

            let options = Options::try_parse_from(["chat-summary-mcp", "--max-exchanges", "1"]).unwrap();
            assert_eq!(options.max_exchanges, 1);
        }
    }
}

pub use resource_resolver::{ResolveError, SessionSummaryResourceResolver};
pub use server::SummaryServer;
pub use session_store::SessionStore;
pub use summaries::SessionSummaries;
pub use summary_agent::{LanguageModel, SessionSummaryAgent, SummaryAgentConfig, SummaryError, SummaryRequest};
pub use variable::{SessionSummaryVariableResolver, parse_references};
