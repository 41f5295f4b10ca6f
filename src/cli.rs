use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{ArtifactIdentity, ArtifactKind};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Positional artifact coordinates shared by most commands
#[derive(ClapArgs, Debug, Clone)]
pub struct ArtifactRef {
    /// Artifact kind: codelist, concept-scheme or category-scheme
    pub kind: ArtifactKind,

    /// Maintenance agency
    pub agency: String,

    /// Artifact id
    pub id: String,

    /// Artifact version
    pub version: String,
}

impl ArtifactRef {
    pub fn identity(&self) -> ArtifactIdentity {
        ArtifactIdentity::new(&self.id, &self.agency, &self.version)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the artifacts of one kind
    List {
        /// Artifact kind: codelist, concept-scheme or category-scheme
        kind: ArtifactKind,
    },

    /// Fetch an artifact and print its flattened items
    Show {
        #[command(flatten)]
        artifact: ArtifactRef,
    },

    /// Fill missing languages and upload the translations
    Translate {
        #[command(flatten)]
        artifact: ArtifactRef,
    },

    /// Add one item and upload it
    Add {
        #[command(flatten)]
        artifact: ArtifactRef,

        /// Id of the new item
        #[arg(long)]
        code_id: String,

        /// Parent item id
        #[arg(long)]
        parent: Option<String>,

        /// Item name
        #[arg(long)]
        name: String,

        /// Item description
        #[arg(long)]
        description: Option<String>,

        /// Language of name and description (defaults to the first configured)
        #[arg(long)]
        lang: Option<String>,

        /// Also translate the artifact after the upload
        #[arg(long)]
        translate: bool,
    },

    /// Create the artifact header if the catalog does not list it yet
    Create {
        #[command(flatten)]
        artifact: ArtifactRef,

        /// Artifact name
        #[arg(long)]
        name: String,

        /// Artifact description
        #[arg(long)]
        description: Option<String>,

        /// Language of name and description (defaults to the first configured)
        #[arg(long)]
        lang: Option<String>,

        /// Translate the name and description into the other languages
        #[arg(long)]
        translate: bool,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
