//! `thumbgrid layout`: pack a JSON item list and print the rows.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use thumbgrid::config::ConfigFile;
use thumbgrid::grid::{layout_sections, GridSection};
use thumbgrid::layout::LayoutPacker;
use thumbgrid::MediaItem;
use tracing::debug;

use super::common::TallPolicyArg;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// JSON array of media items; `-` reads stdin
    input: PathBuf,

    /// Available width in pixels
    #[arg(long, default_value_t = 1200.0)]
    width: f32,

    /// Tile edge length in pixels (overrides config)
    #[arg(long)]
    tile_size: Option<f32>,

    /// Tall item placement (overrides config)
    #[arg(long, value_enum)]
    tall_policy: Option<TallPolicyArg>,

    /// Split rows into per-day sections
    #[arg(long)]
    group_by_date: bool,

    /// Print sections as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: LayoutArgs, config: &ConfigFile) -> Result<(), CliError> {
    let items = read_items(&args.input)?;

    let mut options = config.layout.clone();
    if let Some(tile_size) = args.tile_size {
        if tile_size <= 0.0 {
            return Err(CliError::Config("--tile-size must be positive".to_string()));
        }
        options.tile_size = tile_size;
    }
    if let Some(policy) = args.tall_policy {
        options.tall_policy = policy.into();
    }
    let group_by_date = args.group_by_date || options.group_by_date;

    let packer = LayoutPacker::new(options.packer_config());
    let columns = packer.columns_for_width(args.width);
    debug!(items = items.len(), columns, "Packing items");
    let sections = layout_sections(&packer, group_by_date, &items, args.width);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
    } else {
        print_sections(&sections, columns, options.tile_size, options.gap);
    }
    Ok(())
}

fn read_items(input: &Path) -> Result<Vec<MediaItem>, CliError> {
    let contents = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };
    Ok(serde_json::from_str(&contents)?)
}

fn print_sections(sections: &[GridSection], columns: usize, tile_size: f32, gap: f32) {
    println!("{} columns", columns);
    for section in sections {
        println!();
        println!("[{}] {} rows", section.id, section.rows.len());
        for (index, row) in section.rows.iter().enumerate() {
            let cells: Vec<String> = row
                .items
                .iter()
                .map(|p| {
                    format!(
                        "{}({} {}x{})",
                        p.item.id,
                        p.category.as_str(),
                        p.col_span,
                        p.row_span
                    )
                })
                .collect();
            println!(
                "  {:>4}  {:>6.0}px  {}",
                index,
                row.height(tile_size, gap),
                cells.join(" ")
            );
        }
    }
}
