use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

/// Streaming threshold: files beyond this line count are chunked by size
/// instead of walked key-by-key.
const STREAMING_LINE_THRESHOLD: usize = 20_000;
const TEXT_CHUNK_LINES: usize = 200;

pub struct JsonParser;

impl Parser for JsonParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn language_name(&self) -> &'static str {
        "json"
    }

    fn policy(&self) -> ParserPolicy {
        ParserPolicy {
            supports_streaming: true,
            emits_implementation: true,
        }
    }

    fn parse(&self, file_bytes: &[u8], file_path: &Path) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let (source, line_count) = decode(file_bytes);
        let file_name = push_file_entity(&mut result, file_path, line_count, None);

        if line_count > STREAMING_LINE_THRESHOLD {
            super::text::emit_streamed_chunks(&mut result, file_path, &file_name, &source, TEXT_CHUNK_LINES);
            result.streamed = true;
            return result;
        }

        let mut ts_parser = TsParser::new();
        if ts_parser
            .set_language(&tree_sitter_json::LANGUAGE.into())
            .is_err()
        {
            result.add_diagnostic(ParseDiagnostic::new("failed to load json grammar", None));
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("json parse timed out", None));
                return result;
            }
        };
        let root = tree.root_node();
        let bytes = source.as_bytes();
        let module_name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        let mut ctx = ExtractionContext::new(file_path.to_path_buf(), module_name);

        if let Some(value) = root.named_child(0) {
            walk_value(&value, bytes, file_path, &file_name, &mut ctx, &mut result);
        }
        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn walk_value(
    value: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    if value.kind() != "object" {
        return;
    }
    let mut cursor = value.walk();
    for pair in value.children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let Some(key_node) = pair.child_by_field_name("key") else {
            continue;
        };
        let Some(val_node) = pair.child_by_field_name("value") else {
            continue;
        };
        let key = text(key_node, bytes).trim_matches('"').to_string();
        let line_start = pair.start_position().row + 1;
        let line_end = pair.end_position().row + 1;
        let span = LineSpan::new(line_start, line_end);
        let qualified = ctx.resolve_name(&key, line_start);

        result.add_relation(Relation::new(
            owner,
            qualified.clone(),
            RelationType::Contains,
            file_path.to_path_buf(),
        ));

        let is_container = matches!(val_node.kind(), "object" | "array");
        let entity = Entity::new(
            qualified.clone(),
            EntityType::Variable,
            file_path.to_path_buf(),
            span,
        );
        result.add_entity(entity);

        let metadata_chunk = Chunk::new(
            qualified.clone(),
            ChunkKind::Metadata,
            format!("key {key}"),
            EntityType::Variable,
            file_path.to_path_buf(),
            span,
        )
        .with_has_implementation(is_container);
        result.metadata_chunks.push(metadata_chunk);

        if is_container {
            let implementation_chunk = Chunk::new(
                qualified.clone(),
                ChunkKind::Implementation,
                text(val_node, bytes),
                EntityType::Variable,
                file_path.to_path_buf(),
                span,
            );
            result.implementation_chunks.push(implementation_chunk);
        }

        if val_node.kind() == "object" {
            ctx.push_scope(&key);
            walk_value(&val_node, bytes, file_path, &qualified, ctx, result);
            ctx.pop_scope();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_object_keys_become_entities() {
        let result = JsonParser.parse(br#"{"a": {"b": 1}}"#, Path::new("c.json"));
        assert!(result.entities.iter().any(|e| e.name.ends_with("a")));
        assert!(result.entities.iter().any(|e| e.name.ends_with("a::b")));
    }
}
