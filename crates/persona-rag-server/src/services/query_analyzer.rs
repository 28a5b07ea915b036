/// Query Intent Analyzer
/// Decides what text gets embedded for an open question and how many
/// chunks to pull back for it

use regex::Regex;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::services::conversation::extraction::keyword_regex;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryIntent {
    /// Questions about ordering of jobs and dates
    /// Examples: "what was your most recent company?", "where did you work first?"
    Timeline,

    /// Questions mentioning a configured expansion keyword
    /// Examples: an employer alias mapped to a focused query
    Focused(String),

    /// Anything else, embedded as asked
    SpecificContent,
}

/// Query and depth handed to the retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    pub intent: QueryIntent,
    pub query: String,
    pub k: usize,
}

const TIMELINE_PATTERNS: &[&str] = &[
    "most recent",
    "last company",
    "last job",
    "current",
    "latest",
    "recent experience",
    "previous",
    "earliest",
    "first",
];

struct CompiledExpansion {
    keywords: Vec<(String, Regex)>,
    query: String,
}

pub struct QueryAnalyzer {
    top_k: usize,
    timeline_top_k: usize,
    expansions: Vec<CompiledExpansion>,
}

impl QueryAnalyzer {
    pub fn new(config: &RetrievalConfig) -> Result<Self, regex::Error> {
        let expansions = config
            .query_expansions
            .iter()
            .map(|expansion| {
                let keywords = expansion
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| keyword_regex(k).map(|re| (k.trim().to_string(), re)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledExpansion {
                    keywords,
                    query: expansion.query.clone(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            top_k: config.top_k,
            timeline_top_k: config.timeline_top_k,
            expansions,
        })
    }

    /// Analyze query intent based on pattern matching
    pub fn analyze_intent(&self, query: &str) -> QueryIntent {
        let query_lower = query.to_lowercase();

        for expansion in &self.expansions {
            if let Some((keyword, _)) = expansion.keywords.iter().find(|(_, re)| re.is_match(query)) {
                debug!("Detected Focused intent: matched '{}'", keyword);
                return QueryIntent::Focused(expansion.query.clone());
            }
        }

        for pattern in TIMELINE_PATTERNS {
            if query_lower.contains(pattern) {
                debug!("Detected Timeline intent: matched '{}'", pattern);
                return QueryIntent::Timeline;
            }
        }

        debug!("Defaulting to SpecificContent intent");
        QueryIntent::SpecificContent
    }

    pub fn plan(&self, question: &str) -> RetrievalPlan {
        let intent = self.analyze_intent(question);
        let (query, k) = match &intent {
            QueryIntent::Timeline => (question.to_string(), self.timeline_top_k),
            QueryIntent::Focused(focused) => (focused.clone(), self.top_k),
            QueryIntent::SpecificContent => (question.to_string(), self.top_k),
        };

        RetrievalPlan { intent, query, k }
    }
}
