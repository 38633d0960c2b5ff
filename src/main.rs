mod cli;

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use tunecast::classify::MediaHints;
use tunecast::config::Config;
use tunecast::extract::Extractor;
use tunecast::probe::GatewayProbe;
use tunecast::types::{NormalizedNft, RawNft};
use tunecast::Tunecast;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("TUNECAST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Search { query } => {
            let app = Tunecast::connect(&config)?;
            let users = app.suggest_users(&query).await?;
            if users.is_empty() {
                println!("No users found for {:?}", query);
            }
            for u in users {
                println!("@{} ({}) fid={} followers={}", u.username, u.display_name, u.fid, u.follower_count);
            }
        }
        Commands::Nfts { username, all, refresh, json } => {
            let app = Tunecast::connect(&config)?;
            let Some(collection) = app.audio_collection(&username, all, refresh).await? else {
                println!("User {:?} not found", username);
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&collection)?);
                return Ok(());
            }
            println!(
                "@{}: {} of {} NFTs across {} address(es)",
                collection.profile.username,
                collection.nfts.len(),
                collection.scanned,
                collection.owners.len()
            );
            for nft in &collection.nfts {
                print_nft(app.extractor(), nft);
            }
        }
        Commands::Resolve { uri, probe } => {
            let extractor = Extractor::from_config(&config);
            let resolved = extractor.normalizer().normalize(Some(&uri));
            if resolved.is_empty() {
                println!("(no asset)");
                return Ok(());
            }
            println!("canonical: {}", resolved.canonical_url);
            for f in &resolved.fallback_urls {
                println!("fallback:  {}", f);
            }
            if probe {
                let prober = GatewayProbe::new(Duration::from_secs(10))?;
                let report = prober.probe(&resolved).await;
                for a in &report.attempts {
                    match (a.status, &a.error) {
                        (Some(s), _) => println!("probe {} -> {}", a.url, s),
                        (None, Some(e)) => println!("probe {} -> error: {}", a.url, e),
                        (None, None) => println!("probe {} -> inline", a.url),
                    }
                }
                match report.reachable {
                    Some(url) => println!("reachable: {}", url),
                    None => println!("no source reachable"),
                }
            }
        }
        Commands::Classify { url, mime, audio } => {
            let extractor = Extractor::from_config(&config);
            let hints = MediaHints { mime: mime.as_deref(), audio };
            println!("{}", extractor.classifier().classify(&url, &hints).as_str());
        }
        Commands::Extract { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
            let extractor = Extractor::from_config(&config);
            match extractor.extract(&RawNft(value)) {
                Some(nft) => println!("{}", serde_json::to_string_pretty(&nft)?),
                None => anyhow::bail!("record has no contract address or token id"),
            }
        }
    }
    Ok(())
}

fn print_nft(extractor: &Extractor, nft: &NormalizedNft) {
    println!("- {} [{}] {}", nft.name, nft.collection_name, nft.key);
    match &nft.audio_asset {
        Some(a) => println!("    audio: {} ({} fallbacks)", a.canonical_url, a.fallback_urls.len()),
        None if nft.has_playable_audio => println!("    audio: (sound-only)"),
        None => {}
    }
    match nft.visual() {
        Some(v) => println!("    {}: {}", v.kind.as_str(), v.canonical_url),
        None => println!("    image: {}", extractor.placeholder_image_url(nft)),
    }
}
