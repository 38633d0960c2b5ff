use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Debugging CLI for Farcaster audio-NFT lookups
#[derive(Parser)]
#[command(name = "tunecast")]
#[command(about = "Find, resolve and classify the audio NFTs a Farcaster user holds", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Suggest users matching a query
    Search {
        /// Username prefix or free text
        query: String,
    },
    /// List the NFTs a user's addresses hold
    Nfts {
        username: String,
        /// Include NFTs without playable audio
        #[arg(long)]
        all: bool,
        /// Bypass the response cache
        #[arg(long)]
        refresh: bool,
        /// Print the collection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalize a URI into a canonical URL and gateway fallbacks
    Resolve {
        uri: String,
        /// Check the sources over the network, in order
        #[arg(long)]
        probe: bool,
    },
    /// Classify a media URL
    Classify {
        url: String,
        /// Declared MIME type or format
        #[arg(long)]
        mime: Option<String>,
        /// Treat the URL as an audio field
        #[arg(long)]
        audio: bool,
    },
    /// Normalize a raw NFT JSON record read from a file
    Extract {
        file: PathBuf,
    },
}
