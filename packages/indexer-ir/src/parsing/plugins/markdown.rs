use std::path::Path;

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct MarkdownParser;

impl Parser for MarkdownParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["md", "markdown"]
    }

    fn language_name(&self) -> &'static str {
        "markdown"
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
        let file_name = push_file_entity(&mut result, file_path, line_count, None);
        let module_name = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        let mut ctx = ExtractionContext::new(file_path.to_path_buf(), module_name);

        let lines: Vec<&str> = source.lines().collect();
        let sections = split_sections(&lines);

        // Maintains, per heading level, the qualified name of the most
        // recent heading at that level so nested headings can attach
        // under their closest ancestor.
        let mut ancestors: Vec<(usize, String)> = vec![(0, file_name.clone())];

        for section in sections {
            let owner = ancestors
                .iter()
                .rev()
                .find(|(level, _)| *level < section.level)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| file_name.clone());

            let line_start = section.heading_line + 1;
            let line_end = section.end_line + 1;
            let span = LineSpan::new(line_start, line_end);
            let qualified = ctx.resolve_name(&section.title, line_start);

            result.add_relation(Relation::new(
                owner,
                qualified.clone(),
                RelationType::Contains,
                file_path.to_path_buf(),
            ));

            let first_line = section.body.first().map(|s| s.trim()).unwrap_or("");
            let entity = Entity::new(
                qualified.clone(),
                EntityType::Documentation,
                file_path.to_path_buf(),
                span,
            )
            .with_observations(if first_line.is_empty() {
                Vec::new()
            } else {
                vec![format!("purpose:{first_line}")]
            });
            result.add_entity(entity);

            let metadata_chunk = Chunk::new(
                qualified.clone(),
                ChunkKind::Metadata,
                format!("# {}\n{}", section.title, first_line),
                EntityType::Documentation,
                file_path.to_path_buf(),
                span,
            )
            .with_has_implementation(!section.body.is_empty());
            result.metadata_chunks.push(metadata_chunk);

            if !section.body.is_empty() {
                let implementation_chunk = Chunk::new(
                    qualified.clone(),
                    ChunkKind::Implementation,
                    section.body.join("\n"),
                    EntityType::Documentation,
                    file_path.to_path_buf(),
                    span,
                );
                result.implementation_chunks.push(implementation_chunk);
            }

            ancestors.retain(|(level, _)| *level < section.level);
            ancestors.push((section.level, qualified));
        }

        result
    }
}

struct Section {
    level: usize,
    title: String,
    heading_line: usize,
    end_line: usize,
    body: Vec<String>,
}

fn split_sections(lines: &[&str]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(level) = heading_level(line) {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            let title = line.trim_start_matches('#').trim().to_string();
            current = Some(Section {
                level,
                title,
                heading_line: i,
                end_line: i,
                body: Vec::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.body.push(line.to_string());
            section.end_line = i;
        }
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }
    sections
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    let boundary_ok = match trimmed.chars().nth(hashes) {
        Some(c) => c == ' ',
        None => true,
    };
    if hashes > 0 && hashes <= 6 && boundary_ok {
        Some(hashes)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_headings_form_hierarchy() {
        let src = "# Title\nintro\n## Sub\nbody\n";
        let result = MarkdownParser.parse(src.as_bytes(), Path::new("d.md"));
        assert!(result
            .relations
            .iter()
            .any(|r| r.relation_type == RelationType::Contains && r.to_entity.ends_with("Sub")));
    }
}
