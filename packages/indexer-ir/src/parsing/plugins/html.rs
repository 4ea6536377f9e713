use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct HtmlParser;

impl Parser for HtmlParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["html", "htm"]
    }

    fn language_name(&self) -> &'static str {
        "html"
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
            .set_language(&tree_sitter_html::LANGUAGE.into())
            .is_err()
        {
            result.add_diagnostic(ParseDiagnostic::new("failed to load html grammar", None));
            push_file_entity(&mut result, file_path, line_count, None);
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("html parse timed out", None));
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

        walk_elements(&root, bytes, file_path, &file_name, &mut ctx, &mut result, 0);
        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn tag_name(element: &Node, bytes: &[u8]) -> Option<String> {
    let start_tag = element
        .children(&mut element.walk())
        .find(|n| n.kind() == "start_tag" || n.kind() == "self_closing_tag")?;
    let name_node = start_tag
        .children(&mut start_tag.walk())
        .find(|n| n.kind() == "tag_name")?;
    Some(text(name_node, bytes).to_string())
}

/// Recurses up to two levels deep, emitting an entity per element so
/// both page-level structure and nested regions are captured without
/// unbounded chunk counts for deeply nested markup.
fn walk_elements(
    node: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
    depth: u32,
) {
    if depth > 2 {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "element" {
            continue;
        }
        let Some(name) = tag_name(&child, bytes) else {
            continue;
        };
        let line_start = child.start_position().row + 1;
        let line_end = child.end_position().row + 1;
        let span = LineSpan::new(line_start, line_end);
        let qualified = ctx.resolve_name(&name, line_start);

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
            format!("<{name}> element"),
            EntityType::Other,
            file_path.to_path_buf(),
            span,
        )
        .with_has_implementation(true);
        result.metadata_chunks.push(metadata_chunk);

        let implementation_chunk = Chunk::new(
            qualified.clone(),
            ChunkKind::Implementation,
            text(child, bytes),
            EntityType::Other,
            file_path.to_path_buf(),
            span,
        );
        result.implementation_chunks.push(implementation_chunk);

        ctx.push_scope(&name);
        walk_elements(&child, bytes, file_path, &qualified, ctx, result, depth + 1);
        ctx.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_element_becomes_entity() {
        let result = HtmlParser.parse(b"<div><p>hi</p></div>", Path::new("i.html"));
        assert!(result.entities.iter().any(|e| e.name.contains("div")));
        assert!(result.entities.iter().any(|e| e.name.contains("p")));
    }
}
