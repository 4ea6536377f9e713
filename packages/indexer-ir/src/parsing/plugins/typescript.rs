use std::path::Path;

use tree_sitter::{Node, Parser as TsParser};

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::observation::{extract_observations, ObservationInput};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

/// Covers TypeScript and, via the same grammar, plain JavaScript.
pub struct TypeScriptParser;

impl Parser for TypeScriptParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn language_name(&self) -> &'static str {
        "typescript"
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
        let is_tsx = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("tsx"))
            .unwrap_or(false);
        let language = if is_tsx {
            tree_sitter_typescript::LANGUAGE_TSX
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT
        };
        if ts_parser.set_language(&language.into()).is_err() {
            result.add_diagnostic(ParseDiagnostic::new(
                "failed to load typescript grammar",
                None,
            ));
            push_file_entity(&mut result, file_path, line_count, None);
            return result;
        }
        let tree = match ts_parser.parse(&source, None) {
            Some(t) => t,
            None => {
                result.add_diagnostic(ParseDiagnostic::new("typescript parse timed out", None));
                push_file_entity(&mut result, file_path, line_count, None);
                return result;
            }
        };
        let root = tree.root_node();
        if root.has_error() {
            result.add_diagnostic(ParseDiagnostic::new(
                "typescript source contains syntax errors",
                None,
            ));
        }

        let bytes = source.as_bytes();
        let file_name = push_file_entity(&mut result, file_path, line_count, None);

        let module_name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        let mut ctx = ExtractionContext::new(file_path.to_path_buf(), module_name);

        walk_imports(&root, bytes, file_path, &file_name, &mut result);
        walk_node(&root, bytes, file_path, &file_name, &mut ctx, &mut result);

        result
    }
}

fn text<'a>(node: Node, bytes: &'a [u8]) -> &'a str {
    node.utf8_text(bytes).unwrap_or("")
}

fn walk_imports(
    root: &Node,
    bytes: &[u8],
    file_path: &Path,
    file_name: &str,
    result: &mut ExtractionResult,
) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "import_statement" {
            if let Some(source) = child
                .children(&mut child.walk())
                .find(|n| n.kind() == "string")
            {
                let module = text(source, bytes).trim_matches(|c| c == '"' || c == '\'');
                result.add_relation(Relation::new(
                    file_name,
                    module,
                    RelationType::Imports,
                    file_path.to_path_buf(),
                ));
            }
        }
    }
}

fn walk_node(
    node: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" => {
                handle_class(&child, bytes, file_path, owner, ctx, result);
            }
            "function_declaration" | "method_definition" => {
                handle_function(&child, bytes, file_path, owner, ctx, result, false);
            }
            _ => walk_node(&child, bytes, file_path, owner, ctx, result),
        }
    }
}

fn decorators_of(node: &Node, bytes: &[u8]) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            let raw = text(child, bytes).trim_start_matches('@').trim();
            decorators.push(raw.split('(').next().unwrap_or(raw).to_string());
        }
    }
    decorators
}

fn handle_class(
    class_node: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
) {
    let line_start = class_node.start_position().row + 1;
    let line_end = class_node.end_position().row + 1;
    let span = LineSpan::new(line_start, line_end);

    let raw_name = class_node
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_else(|| ctx.anonymous_name(line_start));
    let qualified = ctx.resolve_name(&raw_name, line_start);

    result.add_relation(Relation::new(
        owner,
        qualified.clone(),
        RelationType::Contains,
        file_path.to_path_buf(),
    ));

    if let Some(heritage) = class_node.child_by_field_name("heritage") {
        let mut cursor = heritage.walk();
        for clause in heritage.children(&mut cursor) {
            if clause.kind() == "extends_clause" {
                if let Some(ident) = clause.named_child(0) {
                    result.add_relation(Relation::new(
                        qualified.clone(),
                        text(ident, bytes),
                        RelationType::Inherits,
                        file_path.to_path_buf(),
                    ));
                }
            }
        }
    }

    let entity = Entity::new(qualified.clone(), EntityType::Class, file_path.to_path_buf(), span);
    result.add_entity(entity);

    let signature = format!("class {raw_name}");
    let metadata_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Metadata,
        signature,
        EntityType::Class,
        file_path.to_path_buf(),
        span,
    )
    .with_has_implementation(true);
    result.metadata_chunks.push(metadata_chunk);

    let implementation_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Implementation,
        text(*class_node, bytes),
        EntityType::Class,
        file_path.to_path_buf(),
        span,
    );
    result.implementation_chunks.push(implementation_chunk);

    if let Some(body) = class_node.child_by_field_name("body") {
        ctx.push_scope(&raw_name);
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "method_definition" {
                handle_function(&member, bytes, file_path, &qualified, ctx, result, true);
            }
        }
        ctx.pop_scope();
    }
}

fn handle_function(
    def: &Node,
    bytes: &[u8],
    file_path: &Path,
    owner: &str,
    ctx: &mut ExtractionContext,
    result: &mut ExtractionResult,
    is_method: bool,
) {
    let line_start = def.start_position().row + 1;
    let line_end = def.end_position().row + 1;
    let span = LineSpan::new(line_start, line_end);

    let raw_name = def
        .child_by_field_name("name")
        .map(|n| text(n, bytes).to_string())
        .unwrap_or_else(|| ctx.anonymous_name(line_start));
    let qualified = ctx.resolve_name(&raw_name, line_start);
    let entity_type = if is_method {
        EntityType::Method
    } else {
        EntityType::Function
    };

    result.add_relation(Relation::new(
        owner,
        qualified.clone(),
        RelationType::Contains,
        file_path.to_path_buf(),
    ));

    let decorators = decorators_of(def, bytes);
    for decorator in &decorators {
        result.add_relation(Relation::new(
            qualified.clone(),
            decorator.clone(),
            RelationType::Decorates,
            file_path.to_path_buf(),
        ));
    }

    let mut stats = BodyStats::default();
    if let Some(body) = def.child_by_field_name("body") {
        collect_stats(&body, bytes, &mut stats);
    }
    for callee in &stats.calls {
        result.add_relation(Relation::new(
            qualified.clone(),
            callee.clone(),
            RelationType::Calls,
            file_path.to_path_buf(),
        ));
    }
    for ctor in &stats.instantiates {
        result.add_relation(Relation::new(
            qualified.clone(),
            ctor.clone(),
            RelationType::Instantiates,
            file_path.to_path_buf(),
        ));
    }
    for exc in &stats.raises {
        result.add_relation(Relation::new(
            qualified.clone(),
            exc.clone(),
            RelationType::Raises,
            file_path.to_path_buf(),
        ));
    }
    for exc in &stats.catches {
        result.add_relation(Relation::new(
            qualified.clone(),
            exc.clone(),
            RelationType::Catches,
            file_path.to_path_buf(),
        ));
    }

    let param_count = def
        .child_by_field_name("parameters")
        .map(|p| p.named_child_count())
        .unwrap_or(0);
    let is_async = text(*def, bytes).trim_start().starts_with("async");

    let observations = extract_observations(
        &qualified,
        &ObservationInput {
            purpose: None,
            param_count: Some(param_count),
            returns: def
                .child_by_field_name("return_type")
                .map(|n| text(n, bytes).to_string()),
            branch_count: Some(stats.branch_count),
            calls: stats.calls.clone(),
            raises: stats.raises.clone(),
            catches: stats.catches.clone(),
            decorators: decorators.clone(),
            is_async: Some(is_async),
        },
    );

    let entity = Entity::new(qualified.clone(), entity_type, file_path.to_path_buf(), span)
        .with_observations(observations.clone());
    result.add_entity(entity);

    let signature = text(*def, bytes).lines().next().unwrap_or("").trim().to_string();
    let mut metadata_content = signature;
    for tag in &observations {
        metadata_content.push('\n');
        metadata_content.push_str(tag);
    }
    let metadata_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Metadata,
        metadata_content,
        entity_type,
        file_path.to_path_buf(),
        span,
    )
    .with_has_implementation(true);
    result.metadata_chunks.push(metadata_chunk);

    let implementation_chunk = Chunk::new(
        qualified.clone(),
        ChunkKind::Implementation,
        text(*def, bytes),
        entity_type,
        file_path.to_path_buf(),
        span,
    );
    result.implementation_chunks.push(implementation_chunk);

    if let Some(body) = def.child_by_field_name("body") {
        ctx.push_scope(&raw_name);
        walk_node(&body, bytes, file_path, &qualified, ctx, result);
        ctx.pop_scope();
    }
}

#[derive(Default)]
struct BodyStats {
    branch_count: u32,
    calls: Vec<String>,
    instantiates: Vec<String>,
    raises: Vec<String>,
    catches: Vec<String>,
}

fn collect_stats(node: &Node, bytes: &[u8], stats: &mut BodyStats) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" | "method_definition" | "arrow_function" => continue,
            "if_statement" | "for_statement" | "for_in_statement" | "while_statement" => {
                stats.branch_count += 1;
                collect_stats(&child, bytes, stats);
            }
            "call_expression" => {
                if let Some(func) = child.child_by_field_name("function") {
                    stats.calls.push(text(func, bytes).to_string());
                }
                collect_stats(&child, bytes, stats);
            }
            "new_expression" => {
                if let Some(ctor) = child.child_by_field_name("constructor") {
                    stats.instantiates.push(text(ctor, bytes).to_string());
                }
                collect_stats(&child, bytes, stats);
            }
            "throw_statement" => {
                if let Some(arg) = child.named_child(0) {
                    stats.raises.push(text(arg, bytes).to_string());
                }
                collect_stats(&child, bytes, stats);
            }
            "catch_clause" => {
                if let Some(param) = child.child_by_field_name("parameter") {
                    stats.catches.push(text(param, bytes).to_string());
                }
                collect_stats(&child, bytes, stats);
            }
            _ => collect_stats(&child, bytes, stats),
        }
    }
}
