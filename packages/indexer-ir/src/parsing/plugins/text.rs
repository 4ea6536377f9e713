use std::path::Path;

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::domain::relation::{Relation, RelationType};
use crate::parsing::plugins::{decode, push_file_entity};
use crate::parsing::{ExtractionResult, Parser, ParserPolicy};
use crate::shared::span::LineSpan;

/// Default size of a free-text chunk, in logical lines.
const DEFAULT_CHUNK_LINES: usize = 200;

pub struct TextParser;

impl Parser for TextParser {
    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "text", "log"]
    }

    fn language_name(&self) -> &'static str {
        "text"
    }

    fn policy(&self) -> ParserPolicy {
        ParserPolicy {
            supports_streaming: true,
            emits_implementation: false,
        }
    }

    fn parse(&self, file_bytes: &[u8], file_path: &Path) -> ExtractionResult {
        let mut result = ExtractionResult::default();
        let (source, line_count) = decode(file_bytes);
        let file_name = push_file_entity(&mut result, file_path, line_count, None);
        emit_streamed_chunks(&mut result, file_path, &file_name, &source, DEFAULT_CHUNK_LINES);
        result
    }
}

/// Splits `source` into fixed-size line windows, each becoming a
/// `text_chunk` entity with a single metadata chunk (no separate
/// implementation chunk — the metadata chunk carries the full text,
/// since `text_chunk` entities have no smaller "signature" form).
pub(crate) fn emit_streamed_chunks(
    result: &mut ExtractionResult,
    file_path: &Path,
    owner: &str,
    source: &str,
    chunk_lines: usize,
) {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return;
    }
    for (index, window) in lines.chunks(chunk_lines.max(1)).enumerate() {
        let line_start = index * chunk_lines + 1;
        let line_end = line_start + window.len() - 1;
        let span = LineSpan::new(line_start, line_end);
        let name = format!("{}::text_chunk_{index}", file_path.display());
        let content = window.join("\n");

        result.add_relation(Relation::new(
            owner,
            name.clone(),
            RelationType::Contains,
            file_path.to_path_buf(),
        ));

        let entity = Entity::new(name.clone(), EntityType::TextChunk, file_path.to_path_buf(), span);
        result.add_entity(entity);

        let chunk = Chunk::new(
            name,
            ChunkKind::Metadata,
            content,
            EntityType::TextChunk,
            file_path.to_path_buf(),
            span,
        )
        .with_has_implementation(false);
        result.metadata_chunks.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_windows() {
        let source = (0..450).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let result = TextParser.parse(source.as_bytes(), Path::new("f.txt"));
        // 450 lines / 200 per chunk -> 3 chunks
        assert_eq!(result.metadata_chunks.len(), 3);
    }

    #[test]
    fn empty_file_has_no_chunks_but_has_file_entity() {
        let result = TextParser.parse(b"", Path::new("f.txt"));
        assert_eq!(result.metadata_chunks.len(), 1); // just the file entity's chunk
    }
}
