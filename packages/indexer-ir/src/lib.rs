//! indexer-ir — entity/relation/chunk data model and the multi-language
//! extraction layer.
//!
//! Feature-first layout, mirroring the rest of this workspace:
//! - `shared`      : error type, source spans
//! - `domain`      : Entity, Relation, Chunk — the graph schema itself
//! - `hashing`     : deterministic content hashing (C1)
//! - `observation` : semantic tag extraction (C4)
//! - `parsing`     : parser registry (C2) and the language parsers (C3)

pub mod domain;
pub mod hashing;
pub mod observation;
pub mod parsing;
pub mod shared;

pub use domain::chunk::{Chunk, ChunkKind};
pub use domain::entity::{Entity, EntityType};
pub use domain::relation::{Relation, RelationType};
pub use hashing::content_hash;
pub use observation::extract_observations;
pub use parsing::registry::ParserRegistry;
pub use parsing::{ExtractionContext, ExtractionResult, ParseDiagnostic, Parser, ParserPolicy};
pub use shared::error::{ErrorKind, IndexerError, Result};
pub use shared::span::LineSpan;
