//! `#session-summary:<session-id>` prompt variables
//!
//! A chat prompt may reference another session's summary. Resolving the
//! variable reuses the live summary document when there is one and asks the
//! model for a fresh summary otherwise.

use std::collections::HashMap;
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::constants::SUMMARY_VARIABLE;
use crate::summaries::SessionSummaries;
use crate::summary_agent::{LanguageModel, SummaryError};

/// Characters that end a sentence rather than a session id
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\''];

/// One `#session-summary:<id>` occurrence in a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableReference {
    pub session_id: String,

    /// Byte range of the whole reference, marker included
    #[serde(skip)]
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVariable {
    pub reference: VariableReference,

    /// Summary text the reference expands to
    pub value: String,

    /// URI of the summary document backing `value`
    pub contents_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrompt {
    pub prompt: String,
    pub variables: Vec<ResolvedVariable>,
}

/// A suggestion for the text after `#session-summary:`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCompletion {
    pub label: String,
    pub insert_text: String,
    pub detail: String,
}

fn marker() -> String {
    format!("#{SUMMARY_VARIABLE}:")
}

/// Find every summary reference in `prompt`, in order.
///
/// The marker must start the prompt or follow a non-alphanumeric character.
/// The session id runs until whitespace, minus trailing punctuation.
pub fn parse_references(prompt: &str) -> Vec<VariableReference> {
    let marker = marker();
    let mut references = Vec::new();
    let mut search_from = 0;

    while let Some(offset) = prompt[search_from..].find(&marker) {
        let start = search_from + offset;
        let id_start = start + marker.len();
        search_from = id_start;

        let attached = prompt[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric);
        if attached {
            continue;
        }

        let rest = &prompt[id_start..];
        let id_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let session_id = rest[..id_len].trim_end_matches(TRAILING_PUNCTUATION);
        if session_id.is_empty() {
            continue;
        }

        let end = id_start + session_id.len();
        references.push(VariableReference {
            session_id: session_id.to_string(),
            range: start..end,
        });
        search_from = end;
    }

    references
}

#[derive(Clone)]
pub struct SessionSummaryVariableResolver {
    summaries: SessionSummaries,
}

impl SessionSummaryVariableResolver {
    pub fn new(summaries: SessionSummaries) -> Self {
        Self { summaries }
    }

    /// Expand one reference to its summary text
    pub async fn resolve<M: LanguageModel>(
        &self,
        model: &M,
        reference: &VariableReference,
    ) -> Result<ResolvedVariable, SummaryError> {
        let session_id = &reference.session_id;
        let contents_uri = SessionSummaries::document_uri(session_id)?.to_string();

        let value = match self.summaries.current(session_id).await? {
            Some(summary) => {
                debug!("Reusing live summary for `#{SUMMARY_VARIABLE}:{session_id}`");
                summary
            }
            None => self.summaries.summarize(model, session_id).await?.summary,
        };

        Ok(ResolvedVariable {
            reference: reference.clone(),
            value,
            contents_uri,
        })
    }

    /// Resolve every reference in `prompt` and inline the summaries.
    /// A session referenced more than once is summarized once.
    pub async fn resolve_prompt<M: LanguageModel>(
        &self,
        model: &M,
        prompt: &str,
    ) -> Result<ResolvedPrompt, SummaryError> {
        let mut resolved_by_id: HashMap<String, ResolvedVariable> = HashMap::new();
        let mut variables = Vec::new();

        for reference in parse_references(prompt) {
            let resolved = match resolved_by_id.get(&reference.session_id) {
                Some(earlier) => ResolvedVariable {
                    reference: reference.clone(),
                    ..earlier.clone()
                },
                None => {
                    let resolved = self.resolve(model, &reference).await?;
                    resolved_by_id.insert(reference.session_id.clone(), resolved.clone());
                    resolved
                }
            };
            variables.push(resolved);
        }

        let mut expanded = String::with_capacity(prompt.len());
        let mut copied_to = 0;
        for variable in &variables {
            let range = &variable.reference.range;
            expanded.push_str(&prompt[copied_to..range.start]);
            expanded.push_str(&format!(
                "<session-summary id=\"{}\">\n{}\n</session-summary>",
                variable.reference.session_id, variable.value
            ));
            copied_to = range.end;
        }
        expanded.push_str(&prompt[copied_to..]);

        Ok(ResolvedPrompt {
            prompt: expanded,
            variables,
        })
    }

    /// Suggestions for session ids starting with `prefix`
    pub async fn complete_argument(&self, prefix: &str) -> Vec<VariableCompletion> {
        self.summaries
            .sessions()
            .list()
            .await
            .into_iter()
            .filter(|session| session.id.starts_with(prefix))
            .map(|session| {
                let exchanges = session.exchanges.len();
                let mut detail = format!(
                    "{exchanges} exchange{}",
                    if exchanges == 1 { "" } else { "s" }
                );
                if session.summary.is_some() {
                    detail.push_str(", summarized");
                }
                VariableCompletion {
                    label: session.display_name().to_string(),
                    insert_text: format!("{}{}", marker(), session.id),
                    detail,
                }
            })
            .collect()
    }
}
