//! `thumbgrid probe`: check content hashes against a disk thumbnail cache.

use std::path::PathBuf;

use clap::Args;
use thumbgrid::config::ConfigFile;
use thumbgrid::thumbnail::{DiskCacheProbe, FsDiskCacheProbe, SizeTier, ThumbnailKey};

use super::common::TierArg;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Content hashes to check
    #[arg(required = true)]
    hashes: Vec<String>,

    /// Size tiers to check (all tiers when omitted)
    #[arg(long, value_enum)]
    tier: Vec<TierArg>,

    /// Cache directory (overrides config)
    #[arg(long)]
    dir: Option<PathBuf>,
}

pub async fn run(args: ProbeArgs, config: &ConfigFile) -> Result<(), CliError> {
    let dir = args
        .dir
        .or_else(|| config.disk_cache_dir())
        .ok_or_else(|| {
            CliError::Config(
                "No thumbnail cache directory. Set cache.directory or use --dir".to_string(),
            )
        })?;

    let tiers: Vec<SizeTier> = if args.tier.is_empty() {
        SizeTier::ALL.to_vec()
    } else {
        args.tier.into_iter().map(SizeTier::from).collect()
    };
    let keys: Vec<ThumbnailKey> = args
        .hashes
        .iter()
        .flat_map(|hash| tiers.iter().map(move |tier| ThumbnailKey::new(hash.clone(), *tier)))
        .collect();

    let probe = FsDiskCacheProbe::new(&dir);
    let results = probe.batch_check(&keys).await?;

    println!("Thumbnail cache: {}", dir.display());
    let mut hits = 0;
    for key in &keys {
        match results.get(key).and_then(|r| r.path.as_ref()) {
            Some(path) => {
                hits += 1;
                println!("  {:<8} {}  {}", key.size_tier.name(), key.content_hash, path.display());
            }
            None => println!("  {:<8} {}  (missing)", key.size_tier.name(), key.content_hash),
        }
    }
    println!("{} of {} cached", hits, keys.len());
    Ok(())
}
