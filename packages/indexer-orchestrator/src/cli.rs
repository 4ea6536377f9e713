use clap::{Parser as ClapParser, Subcommand, ValueEnum};

#[derive(Debug, ClapParser)]
#[command(name = "indexer", about = "Code-graph indexer over a vector store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index (or re-index) a project into a collection.
    Index(IndexArgs),
    /// Search chunks/relations in a collection by payload substring.
    Search(SearchArgs),
    /// Render the graph view for an entity or the whole collection.
    Graph(GraphArgs),
    /// Not implemented in this core.
    WatchStart,
    /// Not implemented in this core.
    Service,
    /// Not implemented in this core.
    AddMcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VectorStoreKind {
    Memory,
    Http,
}

#[derive(Debug, clap::Args)]
pub struct IndexArgs {
    #[arg(long)]
    pub project: std::path::PathBuf,
    #[arg(long)]
    pub collection: String,
    #[arg(long)]
    pub clear: bool,
    #[arg(long = "clear-all")]
    pub clear_all: bool,
    #[arg(long)]
    pub verbose: bool,
    #[arg(long)]
    pub force: bool,
    #[arg(long, value_enum, default_value = "http")]
    pub store: VectorStoreKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchType {
    Entity,
    Relation,
    Chunk,
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    #[arg(long)]
    pub project: std::path::PathBuf,
    #[arg(long)]
    pub collection: String,
    #[arg(long)]
    pub query: String,
    #[arg(long, value_enum, default_value = "chunk")]
    pub r#type: SearchType,
    #[arg(long, value_enum, default_value = "http")]
    pub store: VectorStoreKind,
}

#[derive(Debug, clap::Args)]
pub struct GraphArgs {
    #[arg(long)]
    pub project: std::path::PathBuf,
    #[arg(long)]
    pub collection: String,
    #[arg(long)]
    pub entity: String,
    #[arg(long, default_value_t = 1)]
    pub depth: u8,
    #[arg(long, value_enum, default_value = "http")]
    pub store: VectorStoreKind,
}

/// Exit code for the three stub subcommands the spec calls out as
/// deliberately unimplemented.
pub const NOT_IMPLEMENTED_EXIT: i32 = 2;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn index_requires_project_and_collection() {
        let result = Cli::try_parse_from(["indexer", "index"]);
        assert!(result.is_err());
    }

    #[test]
    fn index_parses_clear_and_force_flags() {
        let cli = Cli::try_parse_from([
            "indexer",
            "index",
            "--project",
            ".",
            "--collection",
            "default",
            "--clear",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Command::Index(args) => {
                assert!(args.clear);
                assert!(args.force);
                assert!(!args.clear_all);
            }
            _ => panic!("expected Index command"),
        }
    }
}
