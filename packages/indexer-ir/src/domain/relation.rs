use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Imports,
    Inherits,
    Calls,
    Instantiates,
    Raises,
    Catches,
    Decorates,
    Reads,
    Writes,
    References,
    Contains,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Imports => "imports",
            RelationType::Inherits => "inherits",
            RelationType::Calls => "calls",
            RelationType::Instantiates => "instantiates",
            RelationType::Raises => "raises",
            RelationType::Catches => "catches",
            RelationType::Decorates => "decorates",
            RelationType::Reads => "reads",
            RelationType::Writes => "writes",
            RelationType::References => "references",
            RelationType::Contains => "contains",
        }
    }
}

/// A directed, typed edge between two entity names.
///
/// `file_path` is the file whose parse produced the relation — the
/// relation is owned by that file and removed along with it. Endpoints
/// may name entities produced elsewhere in the collection, or synthetic
/// "external" names that never resolve to a stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from_entity: String,
    pub to_entity: String,
    pub relation_type: RelationType,
    pub file_path: PathBuf,
}

impl Relation {
    pub fn new(
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        relation_type: RelationType,
        file_path: PathBuf,
    ) -> Self {
        Self {
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            relation_type,
            file_path,
        }
    }

    /// The uniqueness key used to reconcile a file's relations across runs.
    pub fn key(&self) -> (String, String, &'static str, PathBuf) {
        (
            self.from_entity.clone(),
            self.to_entity.clone(),
            self.relation_type.as_str(),
            self.file_path.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_distinguishes_relation_type() {
        let a = Relation::new("a", "b", RelationType::Calls, PathBuf::from("x.py"));
        let b = Relation::new("a", "b", RelationType::Reads, PathBuf::from("x.py"));
        assert_ne!(a.key(), b.key());
    }
}
