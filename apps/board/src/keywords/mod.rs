//! Keyword Context Builder: routes the externally ranked keyword list to the
//! persona whose domain each keyword belongs to, and renders the
//! "Priority Focus Areas" block injected into that persona's prompt.
//!
//! Similarity is pluggable through [`KeywordSimilarity`]; the default
//! [`TokenOverlap`] is a word-overlap heuristic. Whatever backend is used, the
//! routing stays deterministic for fixed inputs.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::keywords::{KeywordContext, RankedKeywords};
use crate::personas::{domains, Persona};

/// Minimum similarity for a keyword to be routed to any persona.
pub const ASSIGNMENT_THRESHOLD: f64 = 0.25;
/// Cap on focus keywords rendered per persona.
pub const MAX_FOCUS_KEYWORDS: usize = 10;

/// Scores how strongly a keyword belongs to a domain described by indicator phrases.
/// Implementations must be pure and monotonic in the indicator set.
pub trait KeywordSimilarity: Send + Sync {
    fn similarity(&self, keyword: &str, indicators: &[&str]) -> f64;
}

impl<T: KeywordSimilarity + ?Sized> KeywordSimilarity for Arc<T> {
    fn similarity(&self, keyword: &str, indicators: &[&str]) -> f64 {
        (**self).similarity(keyword, indicators)
    }
}

/// Fraction of the keyword's words that occur, as substrings, in any indicator phrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlap;

impl KeywordSimilarity for TokenOverlap {
    fn similarity(&self, keyword: &str, indicators: &[&str]) -> f64 {
        let words = tokenize(keyword);
        if words.is_empty() {
            return 0.0;
        }
        let hits = words
            .iter()
            .filter(|w| indicators.iter().any(|phrase| phrase.contains(w.as_str())))
            .count();
        hits as f64 / words.len() as f64
    }
}

fn tokenize(keyword: &str) -> Vec<String> {
    keyword
        .to_lowercase()
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '.' | '(' | ')' | '"' | '\''))
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Assigns keywords to personas using a similarity backend.
#[derive(Debug, Clone, Default)]
pub struct KeywordRouter<S = TokenOverlap> {
    similarity: S,
}

impl<S: KeywordSimilarity> KeywordRouter<S> {
    pub fn new(similarity: S) -> Self {
        Self { similarity }
    }

    /// The persona with the highest similarity, if it clears the threshold.
    /// Ties keep the earliest persona in dispatch order.
    pub fn assign(&self, keyword: &str) -> Option<Persona> {
        let mut best: Option<(Persona, f64)> = None;
        for persona in Persona::ALL {
            let score = self
                .similarity
                .similarity(keyword, domains::indicators(persona));
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((persona, score));
            }
        }
        best.filter(|(_, score)| *score >= ASSIGNMENT_THRESHOLD)
            .map(|(persona, _)| persona)
    }

    /// Keywords routed to `persona`, in ranked order, de-duplicated
    /// case-insensitively and capped at [`MAX_FOCUS_KEYWORDS`].
    pub fn select_for_persona(&self, ranked: &RankedKeywords, persona: Persona) -> KeywordContext {
        let mut seen = HashSet::new();
        let keywords = ranked
            .iter()
            .map(|k| k.kw.trim())
            .filter(|kw| !kw.is_empty())
            .filter(|kw| seen.insert(kw.to_lowercase()))
            .filter(|kw| self.assign(kw) == Some(persona))
            .take(MAX_FOCUS_KEYWORDS)
            .map(str::to_string)
            .collect();

        KeywordContext { persona, keywords }
    }
}

/// Renders the focus block for a persona prompt. Empty when nothing was routed.
pub fn render(context: &KeywordContext, persona_name: &str) -> String {
    if context.keywords.is_empty() {
        return String::new();
    }

    let bullets = context
        .keywords
        .iter()
        .map(|kw| format!("- {kw}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "PRIORITY FOCUS AREAS for {persona_name}:\n\
         The job posting ranks these requirements highest within your area of expertise:\n\
         {bullets}\n\
         Weigh evidence for these areas heavily when scoring."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keywords::Keyword;

    fn kw(text: &str) -> Keyword {
        Keyword {
            kw: text.to_string(),
            score: None,
            extra: Default::default(),
        }
    }

    fn select_for_persona(ranked: &RankedKeywords, persona: Persona) -> KeywordContext {
        KeywordRouter::<TokenOverlap>::default().select_for_persona(ranked, persona)
    }

    fn ranked(knockout: &[&str], skills: &[&str]) -> RankedKeywords {
        RankedKeywords {
            knockout_requirements: knockout.iter().map(|k| kw(k)).collect(),
            skills_ranked: skills.iter().map(|k| kw(k)).collect(),
            metadata: None,
        }
    }

    #[test]
    fn test_token_overlap_is_fraction_of_words() {
        let sim = TokenOverlap;
        assert_eq!(sim.similarity("budget management", &["budget management"]), 1.0);
        assert_eq!(sim.similarity("budget zzz", &["budget management"]), 0.5);
        assert_eq!(sim.similarity("zzz", &["budget management"]), 0.0);
        assert_eq!(sim.similarity("   ", &["budget management"]), 0.0);
    }

    #[test]
    fn test_token_overlap_matches_substrings() {
        assert_eq!(TokenOverlap.similarity("UI", &["user interface ui"]), 1.0);
    }

    #[test]
    fn test_similarity_monotonic_in_indicators() {
        let sim = TokenOverlap;
        let base = ["financial analysis"];
        let extended = ["financial analysis", "kubernetes operators"];
        for keyword in ["kubernetes", "financial modeling", "rust"] {
            assert!(sim.similarity(keyword, &extended) >= sim.similarity(keyword, &base));
        }
    }

    #[test]
    fn test_assign_routes_to_best_domain() {
        let router = KeywordRouter::<TokenOverlap>::default();
        assert_eq!(router.assign("budget management"), Some(Persona::Finance));
        assert_eq!(router.assign("distributed systems"), Some(Persona::Technical));
        assert_eq!(router.assign("usability testing"), Some(Persona::Design));
        assert_eq!(router.assign("mentoring"), Some(Persona::Team));
    }

    #[test]
    fn test_keywords_below_threshold_are_dropped() {
        let router = KeywordRouter::<TokenOverlap>::default();
        assert_eq!(router.assign("zzyzx quuxly"), None);
    }

    struct Flat;
    impl KeywordSimilarity for Flat {
        fn similarity(&self, _keyword: &str, _indicators: &[&str]) -> f64 {
            0.5
        }
    }

    #[test]
    fn test_ties_resolve_to_first_persona_in_order() {
        let router = KeywordRouter::new(Flat);
        assert_eq!(router.assign("anything"), Some(Persona::Hr));
    }

    #[test]
    fn test_each_keyword_goes_to_at_most_one_persona() {
        let ranked = ranked(&["python"], &["budget management", "user research", "mentoring"]);
        let mut total = 0;
        for persona in Persona::ALL {
            total += select_for_persona(&ranked, persona).keywords.len();
        }
        assert!(total <= 4);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let ranked = ranked(
            &["python", "cost reduction"],
            &["kubernetes", "figma", "code review", "strategic vision"],
        );
        for persona in Persona::ALL {
            assert_eq!(
                select_for_persona(&ranked, persona),
                select_for_persona(&ranked, persona)
            );
        }
    }

    #[test]
    fn test_selection_keeps_ranked_order_and_dedups() {
        let ranked = ranked(&["Cost Reduction"], &["budget management", "cost reduction"]);
        let ctx = select_for_persona(&ranked, Persona::Finance);
        assert_eq!(ctx.keywords, vec!["Cost Reduction", "budget management"]);
    }

    #[test]
    fn test_selection_capped() {
        let skills: Vec<String> = (0..20).map(|i| format!("budget forecasting {i}")).collect();
        let refs: Vec<&str> = skills.iter().map(String::as_str).collect();
        let ctx = select_for_persona(&ranked(&[], &refs), Persona::Finance);
        assert_eq!(ctx.keywords.len(), MAX_FOCUS_KEYWORDS);
    }

    #[test]
    fn test_render_lists_keywords() {
        let ctx = KeywordContext {
            persona: Persona::Technical,
            keywords: vec!["rust".to_string(), "kubernetes".to_string()],
        };
        let block = render(&ctx, "Technical Lead");
        assert!(block.starts_with("PRIORITY FOCUS AREAS for Technical Lead"));
        assert!(block.contains("- rust\n- kubernetes"));
    }

    #[test]
    fn test_render_empty_context_is_empty() {
        let ctx = KeywordContext {
            persona: Persona::Hr,
            keywords: vec![],
        };
        assert!(render(&ctx, "HR Manager").is_empty());
    }
}
