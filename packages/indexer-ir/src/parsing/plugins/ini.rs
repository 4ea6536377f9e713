use std::path::Path;

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionContext, ExtractionResult, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

pub struct IniParser;

impl Parser for IniParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["ini", "cfg", "env", "toml", "conf"]
    }

    fn language_name(&self) -> &'static str {
        "ini"
    }

    fn policy(&self) -> ParserPolicy {
        ParserPolicy {
            supports_streaming: false,
            emits_implementation: false,
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

        let mut section = file_name.clone();

        for (i, raw_line) in source.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let line_number = i + 1;

            if line.starts_with('[') && line.ends_with(']') {
                let name = line.trim_start_matches('[').trim_end_matches(']').to_string();
                let span = LineSpan::single(line_number);
                let qualified = ctx.resolve_name(&name, line_number);
                result.add_relation(Relation::new(
                    &file_name,
                    qualified.clone(),
                    RelationType::Contains,
                    file_path.to_path_buf(),
                ));
                let entity = Entity::new(qualified.clone(), EntityType::Other, file_path.to_path_buf(), span);
                result.add_entity(entity);
                let chunk = Chunk::new(
                    qualified.clone(),
                    ChunkKind::Metadata,
                    format!("section [{name}]"),
                    EntityType::Other,
                    file_path.to_path_buf(),
                    span,
                )
                .with_has_implementation(false);
                result.metadata_chunks.push(chunk);
                section = qualified;
                continue;
            }

            let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let span = LineSpan::single(line_number);
            let qualified = format!("{section}::{key}");

            result.add_relation(Relation::new(
                &section,
                qualified.clone(),
                RelationType::Contains,
                file_path.to_path_buf(),
            ));
            let entity = Entity::new(
                qualified.clone(),
                EntityType::Variable,
                file_path.to_path_buf(),
                span,
            );
            result.add_entity(entity);
            let chunk = Chunk::new(
                qualified,
                ChunkKind::Metadata,
                format!("{key} = {value}"),
                EntityType::Variable,
                file_path.to_path_buf(),
                span,
            )
            .with_has_implementation(false);
            result.metadata_chunks.push(chunk);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_and_key_become_entities() {
        let src = "[server]\nport = 8080\n";
        let result = IniParser.parse(src.as_bytes(), Path::new("c.ini"));
        assert!(result.entities.iter().any(|e| e.name.ends_with("server")));
        assert!(result.entities.iter().any(|e| e.name.ends_with("server::port")));
    }

    #[test]
    fn comments_are_ignored() {
        let src = "; comment\n# also comment\nkey=val\n";
        let result = IniParser.parse(src.as_bytes(), Path::new("c.ini"));
        assert!(result.entities.iter().any(|e| e.name.ends_with("key")));
    }
}
