pub mod css;
pub mod html;
pub mod ini;
pub mod json;
pub mod markdown;
pub mod python;
pub mod text;
pub mod typescript;
pub mod yaml;

use std::path::Path;

use crate::domain::chunk::{Chunk, ChunkKind};
use crate::domain::entity::{Entity, EntityType};
use crate::parsing::ExtractionResult;
use crate::shared::span::LineSpan;

/// Shared helper: every parser emits exactly one file entity plus a
/// metadata chunk for it (file entities never get an implementation
/// chunk).
pub(crate) fn push_file_entity(
    result: &mut ExtractionResult,
    file_path: &Path,
    line_count: usize,
    summary: Option<String>,
) -> String {
    let name = file_path.display().to_string();
    let span = LineSpan::new(1, line_count.max(1));
    let entity = Entity::new(name.clone(), EntityType::File, file_path.to_path_buf(), span);
    result.add_entity(entity);

    let content = summary.unwrap_or_else(|| format!("file {name}"));
    let chunk = Chunk::new(
        name.clone(),
        ChunkKind::Metadata,
        content,
        EntityType::File,
        file_path.to_path_buf(),
        span,
    )
    .with_has_implementation(false);
    result.metadata_chunks.push(chunk);
    name
}

/// Splits `bytes` into a lossily-decoded UTF-8 string and its line count.
pub(crate) fn decode(bytes: &[u8]) -> (String, usize) {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let line_count = text.lines().count();
    (text, line_count)
}
