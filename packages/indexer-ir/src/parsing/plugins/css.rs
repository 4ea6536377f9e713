use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct CssParser;

impl Parser for CssParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["css"]
    }

    fn language_name(&self) -> &'static str {
        "css"
    }

    fn policy(&self) -> ParserPolicy {
        ParserPolicy {
            supports_streaming: false,
            emits_implementation: true,
        }
    }

    fn parse(&self, file_bytes: &[u8], file_path: &Path) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let (source, line_count) = decode(file_bytes);

        let mut ts_parser = TsParser::new();
        if ts_parser
            .set_language(&tree_sitter_css::LANGUAGE.into())
            .is_err()
        {
            result.add_diagnostic(ParseDiagnostic::new("failed to load css grammar", None));
            push_file_entity(&mut result, file_path, line_count, None);
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("css parse timed out", None));
                push_file_entity(&mut result, file_path, line_count, None);
                return result;
            }
        };
        let root = tree.root_node();
        let bytes = source.as_bytes();
        let file_name = push_file_entity(&mut result, file_path, line_count, None);
        let module_name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        let mut ctx = ExtractionContext::new(file_path.to_path_buf(), module_name);

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "rule_set" {
                handle_rule(&child, bytes, file_path, &file_name, &mut ctx, &mut result);
            }
        }
        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn handle_rule(
    rule: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    let line_start = rule.start_position().row + 1;
    let line_end = rule.end_position().row + 1;
    let span = LineSpan::new(line_start, line_end);

    let selector_text = rule
        .child_by_field_name("selectors")
        .map(|n| text(n, bytes).trim().to_string())
        .unwrap_or_else(|| ctx.anonymous_name(line_start));
    let qualified = ctx.resolve_name(&selector_text, line_start);

    result.add_relation(Relation::new(
        owner,
        qualified.clone(),
        RelationType::Contains,
        file_path.to_path_buf(),
    ));

    let entity = Entity::new(qualified.clone(), EntityType::Other, file_path.to_path_buf(), span);
    result.add_entity(entity);

    let metadata_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Metadata,
        format!("rule {selector_text}"),
        EntityType::Other,
        file_path.to_path_buf(),
        span,
    )
    .with_has_implementation(true);
    result.metadata_chunks.push(metadata_chunk);

    let implementation_chunk = Chunk::new(
        qualified,
        ChunkKind::Implementation,
        text(*rule, bytes),
        EntityType::Other,
        file_path.to_path_buf(),
        span,
    );
    result.implementation_chunks.push(implementation_chunk);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_becomes_entity() {
        let result = CssParser.parse(b".button { color: red; }", Path::new("s.css"));
        assert!(result.entities.iter().any(|e| e.entity_type == EntityType::Other));
        assert_eq!(result.implementation_chunks.len(), 1);
    }
}
