use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "axm", version, about = "AXM shard build and verify pipeline")]
pub struct Cli {
    /// Emit the canonical JSON report on stdout instead of a human summary.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build artifacts.
    #[command(subcommand)]
    Build(BuildCommand),
    /// Verify artifacts.
    #[command(subcommand)]
    Verify(VerifyCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum BuildCommand {
    /// Compile a source document and a candidates stream into a signed shard.
    Compile {
        /// Path to the normalized-text source document.
        source: PathBuf,

        /// Path to the newline-delimited JSON candidates stream.
        #[arg(long)]
        candidates: PathBuf,

        /// Output directory for the shard (must not already exist).
        #[arg(long)]
        out: PathBuf,

        /// 64 hex-character Ed25519 seed. Falls back to `AXM_PRIVATE_KEY` if absent.
        #[arg(long)]
        key: Option<String>,

        /// Entity/claim identity namespace.
        #[arg(long)]
        namespace: String,

        /// Publisher id recorded in the manifest.
        #[arg(long = "publisher-id")]
        publisher_id: String,

        /// Publisher display name recorded in the manifest.
        #[arg(long = "publisher-name")]
        publisher_name: String,

        /// RFC 3339 build timestamp recorded in the manifest.
        #[arg(long = "created-at")]
        created_at: String,

        /// License identifier recorded in the manifest.
        #[arg(long, default_value = "CC-BY-4.0")]
        license: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum VerifyCommand {
    /// Verify a shard's layout, manifest, signature, Merkle root, schema,
    /// identities, references, and evidence spans.
    Shard {
        /// Path to the shard directory.
        path: PathBuf,

        /// Path to a file holding the publisher's trusted public key
        /// (32 raw bytes, or hex text).
        #[arg(long = "trusted-key")]
        trusted_key: PathBuf,

        /// Verification strictness. Only `strict` is currently supported.
        #[arg(long, default_value = "strict")]
        mode: String,
    },
}
