use regex::Regex;

use crate::config::FieldMatcher;

/// Case-insensitive, word-bounded match for a literal keyword.
pub(crate) fn keyword_regex(keyword: &str) -> Result<Regex, regex::Error> {
    // word-bounded without \b so keywords like "C++" still match
    Regex::new(&format!(
        r"(?i)(^|[^\w]){}($|[^\w])",
        regex::escape(keyword.trim())
    ))
}

struct CompiledMatcher {
    field: String,
    keywords: Vec<(String, Regex)>,
}

/// Keyword matching over generated replies.
pub struct FieldExtractor {
    matchers: Vec<CompiledMatcher>,
}

impl FieldExtractor {
    pub fn new(matchers: &[FieldMatcher]) -> Result<Self, regex::Error> {
        let matchers = matchers
            .iter()
            .map(|m| {
                let keywords = m
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| keyword_regex(k).map(|re| (k.trim().to_string(), re)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledMatcher {
                    field: m.field.clone(),
                    keywords,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { matchers })
    }

    /// `(field, keyword)` pairs found in `text`, in configuration order.
    pub fn extract(&self, text: &str) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for matcher in &self.matchers {
            for (keyword, re) in &matcher.keywords {
                if re.is_match(text) {
                    found.push((matcher.field.clone(), keyword.clone()));
                }
            }
        }
        found
    }
}
