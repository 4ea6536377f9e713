use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct YamlParser;

impl Parser for YamlParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn language_name(&self) -> &'static str {
        "yaml"
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
            .set_language(&tree_sitter_yaml::LANGUAGE.into())
            .is_err()
        {
            result.add_diagnostic(ParseDiagnostic::new("failed to load yaml grammar", None));
            push_file_entity(&mut result, file_path, line_count, None);
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("yaml parse timed out", None));
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

        if let Some(mapping) = find_mapping(&root) {
            walk_mapping(&mapping, bytes, file_path, &file_name, &mut ctx, &mut result);
        }
        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn find_mapping<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    if node.kind() == "block_mapping" || node.kind() == "flow_mapping" {
        return Some(*node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_mapping(&child) {
            return Some(found);
        }
    }
    None
}

fn walk_mapping(
    mapping: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    let mut cursor = mapping.walk();
    for pair in mapping.children(&mut cursor) {
        if pair.kind() != "block_mapping_pair" && pair.kind() != "flow_pair" {
            continue;
        }
        let Some(key_node) = pair.child_by_field_name("key") else {
            continue;
        };
        let key = text(key_node, bytes).trim().to_string();
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

        let nested = pair.child_by_field_name("value").and_then(|v| find_mapping(&v));
        let is_container = nested.is_some();

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
                text(pair, bytes),
                EntityType::Variable,
                file_path.to_path_buf(),
                span,
            );
            result.implementation_chunks.push(implementation_chunk);
        }

        if let Some(nested_mapping) = nested {
            ctx.push_scope(&key);
            walk_mapping(&nested_mapping, bytes, file_path, &qualified, ctx, result);
            ctx.pop_scope();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_keys_become_entities() {
        let result = YamlParser.parse(b"a: 1\nb:\n  c: 2\n", Path::new("c.yaml"));
        assert!(result.entities.iter().any(|e| e.name.ends_with("a")));
        assert!(result.entities.iter().any(|e| e.name.ends_with("b::c")));
    }
}
