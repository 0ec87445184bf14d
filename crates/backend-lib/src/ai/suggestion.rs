// ============================
// backend-lib/src/ai/suggestion.rs
// ============================
//! Suggestion extraction from model responses, the runnability gate, and
//! the store that tracks suggestions until they are accepted or rejected.
use chrono::{DateTime, Utc};
use coderoom_common::{CodeSuggestion, CurrentFile, SuggestionStatus};
use dashmap::DashMap;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").expect("code block regex"));

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Phrases that mark a block as an excerpt rather than a complete file.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "rest of code",
    "rest of the code",
    "rest of file",
    "remaining code",
    "your code here",
    "code goes here",
];

/// Why a fenced block was not promoted to a pending suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionRejection {
    Empty,
    UnresolvedPlaceholder,
    MissingEntryPoint,
    NoObservableOutput,
}

impl fmt::Display for SuggestionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "empty code block",
            Self::UnresolvedPlaceholder => "unresolved placeholder",
            Self::MissingEntryPoint => "missing entry point",
            Self::NoObservableOutput => "no observable output",
        };
        f.write_str(reason)
    }
}

struct LanguageRule {
    aliases: &'static [&'static str],
    entry_point: Option<&'static str>,
    output_markers: &'static [&'static str],
}

/// Keyed by fence tag or editor language. Languages not listed here pass
/// the runnability gate unchecked.
const LANGUAGE_RULES: &[LanguageRule] = &[
    LanguageRule {
        aliases: &["python", "py", "python3"],
        entry_point: None,
        output_markers: &["print("],
    },
    LanguageRule {
        aliases: &["rust", "rs"],
        entry_point: Some("fn main"),
        output_markers: &["println!", "print!", "eprintln!"],
    },
    LanguageRule {
        aliases: &["javascript", "js", "node"],
        entry_point: None,
        output_markers: &["console.log", "console.error", "console.info", "process.stdout"],
    },
    LanguageRule {
        aliases: &["typescript", "ts"],
        entry_point: None,
        output_markers: &["console.log", "console.error", "console.info"],
    },
    LanguageRule {
        aliases: &["go", "golang"],
        entry_point: Some("func main"),
        output_markers: &["fmt.Print"],
    },
    LanguageRule {
        aliases: &["java"],
        entry_point: Some("public static void main"),
        output_markers: &["System.out"],
    },
    LanguageRule {
        aliases: &["c"],
        entry_point: Some("int main"),
        output_markers: &["printf", "puts("],
    },
    LanguageRule {
        aliases: &["cpp", "c++", "cc"],
        entry_point: Some("int main"),
        output_markers: &["std::cout", "printf", "puts("],
    },
];

fn language_rule(language: &str) -> Option<&'static LanguageRule> {
    let lowered = language.to_lowercase();
    LANGUAGE_RULES
        .iter()
        .find(|rule| rule.aliases.contains(&lowered.as_str()))
}

fn has_placeholder(code: &str) -> bool {
    let lowered = code.to_lowercase();
    if PLACEHOLDER_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return true;
    }
    code.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed == "..." || trimmed == "\u{2026}" {
            return true;
        }
        let is_comment = trimmed.starts_with("//")
            || trimmed.starts_with('#')
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("--");
        is_comment && (trimmed.contains("...") || trimmed.contains('\u{2026}'))
    })
}

/// Minimal-runnability gate. Placeholder markers reject in any language;
/// the entry-point and output checks apply only to languages in the table.
pub fn validate_suggestion(code: &str, language: &str) -> Result<(), SuggestionRejection> {
    if code.trim().is_empty() {
        return Err(SuggestionRejection::Empty);
    }
    if has_placeholder(code) {
        return Err(SuggestionRejection::UnresolvedPlaceholder);
    }
    let Some(rule) = language_rule(language) else {
        return Ok(());
    };
    if let Some(entry) = rule.entry_point {
        if !code.contains(entry) {
            return Err(SuggestionRejection::MissingEntryPoint);
        }
    }
    if !rule.output_markers.iter().any(|marker| code.contains(marker)) {
        return Err(SuggestionRejection::NoObservableOutput);
    }
    Ok(())
}

/// Pulls a reviewable suggestion out of a model response.
///
/// The last fenced block wins and the text before the first fence becomes
/// the explanation. Returns `None` when the response has no fenced block
/// or the block fails the runnability gate.
pub fn extract_suggestion(response: &str, file: &CurrentFile) -> Option<CodeSuggestion> {
    let captures = CODE_BLOCK.captures_iter(response).last()?;

    let suggested_code = captures.get(2).map_or("", |m| m.as_str()).trim().to_string();
    let language = captures
        .get(1)
        .map_or(file.language.as_str(), |tag| tag.as_str());

    if let Err(reason) = validate_suggestion(&suggested_code, language) {
        debug!(file = %file.name, %reason, "discarding suggestion");
        return None;
    }

    let explanation = response
        .split("```")
        .next()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map_or_else(
            || "AI suggested code modification".to_string(),
            str::to_string,
        );

    Some(CodeSuggestion {
        id: Uuid::new_v4(),
        file_id: file.id.clone(),
        file_name: file.name.clone(),
        original_code: file.content.clone(),
        suggested_code,
        explanation,
        status: SuggestionStatus::Pending,
    })
}

/// A tracked suggestion plus its lifecycle timestamps.
#[derive(Debug, Clone)]
pub struct StoredSuggestion {
    pub suggestion: CodeSuggestion,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Pending and recently resolved suggestions, keyed by suggestion id.
///
/// Resolution is a compare-and-set on the stored status: exactly one
/// accept or reject wins and every later attempt observes a non-pending
/// entry.
#[derive(Clone)]
pub struct SuggestionStore {
    entries: Arc<DashMap<Uuid, StoredSuggestion>>,
    retention: Duration,
}

impl SuggestionStore {
    /// Creates the store and spawns the background retention sweep.
    pub fn new(retention: Duration) -> Self {
        let store = Self {
            entries: Arc::new(DashMap::new()),
            retention,
        };
        let sweeper = store.clone();
        tokio::spawn(async move {
            sweeper.retention_task().await;
        });
        store
    }

    pub fn insert(&self, suggestion: CodeSuggestion) {
        let id = suggestion.id;
        self.entries.insert(
            id,
            StoredSuggestion {
                suggestion,
                created_at: Utc::now(),
                resolved_at: None,
            },
        );
    }

    pub fn get(&self, id: Uuid) -> Option<CodeSuggestion> {
        self.entries.get(&id).map(|entry| entry.suggestion.clone())
    }

    /// Flips a pending suggestion to `status` and returns the final
    /// suggestion. Unknown ids and already resolved entries both report a
    /// conflict, so callers cannot double-apply.
    pub fn resolve(&self, id: Uuid, status: SuggestionStatus) -> Result<CodeSuggestion, AppError> {
        let mut entry = self.entries.get_mut(&id).ok_or_else(Self::no_longer_pending)?;
        if entry.suggestion.status != SuggestionStatus::Pending {
            return Err(Self::no_longer_pending());
        }
        entry.suggestion.status = status;
        entry.resolved_at = Some(Utc::now());
        Ok(entry.suggestion.clone())
    }

    fn no_longer_pending() -> AppError {
        AppError::StateConflict("Suggestion is no longer pending".to_string())
    }

    /// Drops entries older than the retention window. Returns the number
    /// removed.
    pub fn evict_stale(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            Utc::now()
                .signed_duration_since(entry.created_at)
                .to_std()
                .is_ok_and(|age| age <= self.retention)
        });
        before - self.entries.len()
    }

    async fn retention_task(&self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = self.evict_stale();
            if removed > 0 {
                info!(removed, "evicted stale suggestions");
            }
        }
    }
}
