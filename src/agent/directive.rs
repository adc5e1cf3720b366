//! Directives recognised in planner output.
//!
//! Free text is matched on literal markers, not parsed: a search needs both
//! [`SEARCH_MARKER`] and the word `entity`, a final answer needs
//! [`FINAL_MARKER`]. Anything else is no directive at all.

use super::tool::ToolInput;
use super::tools::generator;

/// Marker that introduces a search instruction.
pub const SEARCH_MARKER: &str = "INSTRUCTION: PERFORM SEARCH";
/// Marker that introduces the final answer.
pub const FINAL_MARKER: &str = "FINAL ANSWER:";

const ENTITY_TOKEN: &str = "entity";

/// The next action the planner asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Look up the one-hop neighborhood of an entity.
    Search(String),
    /// Hypothesize a missing fact.
    Fabricate { entity: String, relation: String },
    /// Stop; the payload is the planner text verbatim.
    FinalAnswer(String),
}

impl Directive {
    /// Recognise a directive in planner free text.
    ///
    /// The search marker is checked before the final-answer marker.
    pub fn parse(text: &str) -> Option<Self> {
        if text.contains(SEARCH_MARKER) {
            return search_entity(text).map(Directive::Search);
        }
        if text.contains(FINAL_MARKER) {
            return Some(Directive::FinalAnswer(text.to_string()));
        }
        None
    }

    /// Recognise a fabrication request in a planner tool call.
    pub fn from_tool_call(name: &str, args: &ToolInput) -> Option<Self> {
        if name != generator::TOOL_NAME {
            return None;
        }
        let entity = args.get(generator::PARAM_ENTITY)?.trim();
        let relation = args.get(generator::PARAM_RELATION)?.trim();
        if entity.is_empty() || relation.is_empty() {
            return None;
        }
        Some(Directive::Fabricate {
            entity: entity.to_string(),
            relation: relation.to_string(),
        })
    }
}

/// Everything after the first `entity`, stripped of surrounding punctuation.
fn search_entity(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(ENTITY_TOKEN)?;
    let name = rest.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | '.' | '[' | ']' | '"' | '\'' | '`')
    });
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_search() {
        assert_eq!(
            Directive::parse("INSTRUCTION: PERFORM SEARCH for entity [Tom Hanks]"),
            Some(Directive::Search("Tom Hanks".into()))
        );
    }

    #[test]
    fn search_with_trailing_punctuation_and_newline() {
        assert_eq!(
            Directive::parse("Let me look.\nINSTRUCTION: PERFORM SEARCH for entity: Keanu Reeves.\n"),
            Some(Directive::Search("Keanu Reeves".into()))
        );
    }

    #[test]
    fn search_name_keeps_inner_punctuation() {
        assert_eq!(
            Directive::parse("INSTRUCTION: PERFORM SEARCH for entity [You've Got Mail]"),
            Some(Directive::Search("You've Got Mail".into()))
        );
    }

    #[test]
    fn search_without_entity_token_is_nothing() {
        assert_eq!(Directive::parse("INSTRUCTION: PERFORM SEARCH for Tom Hanks"), None);
        assert_eq!(Directive::parse("INSTRUCTION: PERFORM SEARCH for entity []"), None);
    }

    #[test]
    fn marker_is_case_sensitive() {
        assert_eq!(Directive::parse("instruction: perform search for entity X"), None);
        assert_eq!(Directive::parse("final answer: 42"), None);
    }

    #[test]
    fn final_answer_is_verbatim() {
        let text = "Both acted in nothing together.\nFINAL ANSWER: None";
        assert_eq!(
            Directive::parse(text),
            Some(Directive::FinalAnswer(text.into()))
        );
    }

    #[test]
    fn search_takes_precedence_over_final() {
        let text = "INSTRUCTION: PERFORM SEARCH for entity [Big] FINAL ANSWER: maybe";
        assert!(matches!(Directive::parse(text), Some(Directive::Search(_))));
    }

    #[test]
    fn plain_text_is_nothing() {
        assert_eq!(Directive::parse("I am thinking about it."), None);
        assert_eq!(Directive::parse(""), None);
    }

    #[test]
    fn fabrication_from_tool_call() {
        let args = ToolInput::new()
            .with_param("entity_name", "Keanu Reeves")
            .with_param("desired_relation", "ACTED_IN_MOVIE_WITH");
        assert_eq!(
            Directive::from_tool_call("knowledge_generator", &args),
            Some(Directive::Fabricate {
                entity: "Keanu Reeves".into(),
                relation: "ACTED_IN_MOVIE_WITH".into(),
            })
        );
        assert_eq!(Directive::from_tool_call("other_tool", &args), None);
        assert_eq!(
            Directive::from_tool_call("knowledge_generator", &ToolInput::new()),
            None
        );
    }
}
