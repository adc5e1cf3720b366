//! Knowledge generator tool: hypothesizes a missing fact.
//!
//! The result is a placeholder assertion for reasoning continuity. It is never
//! validated and never written to the graph.

use crate::agent::error::AgentResult;
use crate::agent::tool::{Tool, ToolInput, ToolOutput, ToolParam, ToolSignature};

pub const TOOL_NAME: &str = "knowledge_generator";
pub const PARAM_ENTITY: &str = "entity_name";
pub const PARAM_RELATION: &str = "desired_relation";

/// The placeholder assertion for `entity_name` having `desired_relation`.
pub fn fabricate(entity_name: &str, desired_relation: &str) -> String {
    format!("Hypothesized: {entity_name} has relation {desired_relation}.")
}

/// Tool wrapper around [`fabricate`]. Extra arguments are ignored.
pub struct KnowledgeGeneratorTool;

impl Tool for KnowledgeGeneratorTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: TOOL_NAME.into(),
            description: "Used to hypothesize a missing fact when the database has no data.".into(),
            parameters: vec![
                ToolParam {
                    name: PARAM_ENTITY.into(),
                    description: "Entity the fact is about.".into(),
                    required: true,
                },
                ToolParam {
                    name: PARAM_RELATION.into(),
                    description: "Relation to hypothesize for the entity.".into(),
                    required: true,
                },
            ],
        }
    }

    fn execute(&self, input: ToolInput) -> AgentResult<ToolOutput> {
        let entity = input.require(PARAM_ENTITY, TOOL_NAME)?;
        let relation = input.require(PARAM_RELATION, TOOL_NAME)?;
        Ok(ToolOutput::ok(fabricate(entity, relation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_deterministic() {
        let a = fabricate("Keanu Reeves", "ACTED_IN_MOVIE_WITH");
        assert_eq!(a, "Hypothesized: Keanu Reeves has relation ACTED_IN_MOVIE_WITH.");
        assert_eq!(a, fabricate("Keanu Reeves", "ACTED_IN_MOVIE_WITH"));
    }

    #[test]
    fn tool_ignores_extra_arguments() {
        let out = KnowledgeGeneratorTool
            .execute(
                ToolInput::new()
                    .with_param(PARAM_ENTITY, "Keanu Reeves")
                    .with_param(PARAM_RELATION, "ACTED_IN_MOVIE_WITH")
                    .with_param("target_entity", "Tom Hanks"),
            )
            .unwrap();
        assert_eq!(out.result, fabricate("Keanu Reeves", "ACTED_IN_MOVIE_WITH"));
    }

    #[test]
    fn tool_requires_both_arguments() {
        let only_entity = ToolInput::new().with_param(PARAM_ENTITY, "Keanu Reeves");
        assert!(KnowledgeGeneratorTool.execute(only_entity).is_err());
    }
}
