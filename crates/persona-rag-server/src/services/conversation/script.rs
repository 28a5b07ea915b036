use regex::Regex;
use tracing::debug;

use crate::config::GuidedPrompt;

/// Fixed, ordered list of guided questions.
#[derive(Debug, Clone)]
pub struct GuidedScript {
    prompts: Vec<GuidedPrompt>,
}

impl GuidedScript {
    pub fn new(prompts: Vec<GuidedPrompt>) -> Self {
        Self { prompts }
    }

    /// Prompt still waiting for an answer at `stage`, if any.
    pub fn prompt(&self, stage: usize) -> Option<&GuidedPrompt> {
        self.prompts.get(stage)
    }

    pub fn is_exhausted(&self, stage: usize) -> bool {
        stage >= self.prompts.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerVerdict {
    /// Input answers the pending prompt; `None` when the visitor declined.
    Answer(Option<String>),
    /// Input is a free-form question for the knowledge base.
    Open,
}

/// Decides whether an input answers the pending guided prompt.
pub trait AnswerClassifier: Send + Sync {
    fn classify(&self, prompt: &GuidedPrompt, input: &str) -> AnswerVerdict;
}

/// Pattern-based classifier.
///
/// Questions and requests are open turns; anything else answers the
/// pending prompt, minus conversational lead-ins.
pub struct HeuristicClassifier {
    question: Regex,
    request: Regex,
    decline: Regex,
    lead_in: Regex,
}

impl HeuristicClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            question: Regex::new(
                r"(?i)^\s*(what|what's|how|why|when|where|who|which|tell me|tell us|can you|could you|would you|do you|did you|have you|are you|were you|is there|describe|explain|walk me through)\b",
            )?,
            request: Regex::new(
                r"(?i)^\s*(please\s+)?(give me|give us|show me|show us|summari[sz]e|list|share|talk about|talk me through|elaborate|outline|compare|highlight|go over|let me know|help me understand|i'd like to (know|hear|learn)|i would like to (know|hear|learn)|i want to (know|hear|learn)|i'm curious|i am curious|i wonder)\b",
            )?,
            decline: Regex::new(r"(?i)^\s*(skip|pass|n/?a|none|no comment|rather not say)\s*[.!]*\s*$")?,
            lead_in: Regex::new(
                r"(?i)^\s*(i work (at|for)|i'm (at|from|with)|i am (at|from|with)|we're hiring (for|a|an)|we are hiring (for|a|an)|i'm hiring (for|a|an)|hiring (for|a|an)|we're|we are|it's|it is|(the|our|my) (\w+ ){0,2}is)\s+",
            )?,
        })
    }
}

impl AnswerClassifier for HeuristicClassifier {
    fn classify(&self, prompt: &GuidedPrompt, input: &str) -> AnswerVerdict {
        let input = input.trim();

        if input.ends_with('?') || self.question.is_match(input) || self.request.is_match(input) {
            debug!("Input reads as a question, not an answer to '{}'", prompt.field);
            return AnswerVerdict::Open;
        }

        if self.decline.is_match(input) {
            return AnswerVerdict::Answer(None);
        }

        let value = self
            .lead_in
            .replace(input, "")
            .trim()
            .trim_end_matches(['.', '!', ',', ';'])
            .trim()
            .to_string();

        if value.is_empty() {
            AnswerVerdict::Answer(None)
        } else {
            AnswerVerdict::Answer(Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> GuidedPrompt {
        GuidedPrompt {
            field: "company".to_string(),
            question: "Which company are you reaching out from?".to_string(),
        }
    }

    fn classify(input: &str) -> AnswerVerdict {
        HeuristicClassifier::new().unwrap().classify(&prompt(), input)
    }

    #[test]
    fn test_questions_are_open() {
        assert_eq!(classify("What technologies does the candidate know?"), AnswerVerdict::Open);
        assert_eq!(classify("tell me about your last project"), AnswerVerdict::Open);
        assert_eq!(classify("Acme?"), AnswerVerdict::Open);
    }

    #[test]
    fn test_requests_without_question_mark_are_open() {
        for input in [
            "Give me an overview of your Python work",
            "Summarize your experience at Northwind",
            "List the languages you use",
            "Share a project you are proud of.",
            "Show me your leadership experience",
            "Talk about a time you failed",
            "I'd like to know how you handle conflict",
            "Please outline your last role",
        ] {
            assert_eq!(classify(input), AnswerVerdict::Open, "{}", input);
        }
    }

    #[test]
    fn test_company_names_starting_like_requests_are_answers() {
        assert_eq!(
            classify("Listrak"),
            AnswerVerdict::Answer(Some("Listrak".to_string()))
        );
        assert_eq!(
            classify("Shareable Labs"),
            AnswerVerdict::Answer(Some("Shareable Labs".to_string()))
        );
    }

    #[test]
    fn test_plain_answer_is_taken_literally() {
        assert_eq!(classify("Acme Corp"), AnswerVerdict::Answer(Some("Acme Corp".to_string())));
    }

    #[test]
    fn test_lead_ins_and_punctuation_are_stripped() {
        assert_eq!(
            classify("I work at Acme Corp."),
            AnswerVerdict::Answer(Some("Acme Corp".to_string()))
        );
        assert_eq!(
            classify("The company is Globex!"),
            AnswerVerdict::Answer(Some("Globex".to_string()))
        );
        assert_eq!(
            classify("we're hiring for a staff engineer"),
            AnswerVerdict::Answer(Some("a staff engineer".to_string()))
        );
    }

    #[test]
    fn test_decline_is_accepted_without_value() {
        assert_eq!(classify("skip"), AnswerVerdict::Answer(None));
        assert_eq!(classify("N/A."), AnswerVerdict::Answer(None));
    }

    #[test]
    fn test_script_exhaustion() {
        let script = GuidedScript::new(vec![prompt()]);
        assert_eq!(script.prompt(0).map(|p| p.field.as_str()), Some("company"));
        assert!(script.prompt(1).is_none());
        assert!(!script.is_exhausted(0));
        assert!(script.is_exhausted(1));
    }
}
