//! TS-Map-Engine Kommandozeile.
//!
//! Lädt ein Karten-Verzeichnis und gibt Statistiken aus, schreibt es
//! unverändert zurück oder fragt den Spatial-Index ab.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use glam::Vec2;
use ts_map_engine::{load_map, save_map, EngineOptions, ItemKind};

#[derive(Parser)]
#[command(name = "ts-map")]
#[command(version)]
#[command(about = "Sektor-Karten im TS-Binaerformat lesen und schreiben")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Optionen aus dieser TOML-Datei statt ts_map_engine.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Karte laden und Sektoren, Nodes und Items pro Typ zaehlen
    Info {
        /// Karten-Verzeichnis mit den Sektor-Dateien
        dir: PathBuf,
    },

    /// Karte laden und in ein anderes Verzeichnis zurueckschreiben
    Resave { dir: PathBuf, out: PathBuf },

    /// UIDs aller Nodes im Rechteck (X/Z) ausgeben
    Query {
        dir: PathBuf,
        #[arg(allow_negative_numbers = true)]
        min_x: f32,
        #[arg(allow_negative_numbers = true)]
        min_z: f32,
        #[arg(allow_negative_numbers = true)]
        max_x: f32,
        #[arg(allow_negative_numbers = true)]
        max_z: f32,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(EngineOptions::config_path);
    let options = EngineOptions::load_from_file(&config_path);

    match cli.command {
        Command::Info { dir } => {
            let (map, report) = load_map(&dir, &options)?;
            let mut per_kind: BTreeMap<ItemKind, usize> = BTreeMap::new();
            for (_, item) in map.items() {
                *per_kind.entry(item.kind()).or_default() += 1;
            }
            println!("Sektoren: {}", report.sectors);
            println!("Nodes:    {}", report.nodes);
            println!("Items:    {}", report.items);
            for (kind, count) in per_kind {
                println!("  {:<10} {count}", kind.name());
            }
            let issues = map.validate();
            if !issues.is_empty() {
                println!("{} Auffaelligkeiten:", issues.len());
                for issue in issues.iter().take(20) {
                    println!("  {issue}");
                }
            }
        }
        Command::Resave { dir, out } => {
            let (map, _) = load_map(&dir, &options)?;
            let report = save_map(&map, &out)?;
            println!(
                "{} Sektoren, {} Dateien nach {} geschrieben",
                report.sectors,
                report.files_written,
                out.display()
            );
        }
        Command::Query {
            dir,
            min_x,
            min_z,
            max_x,
            max_z,
        } => {
            let (map, _) = load_map(&dir, &options)?;
            let mut uids: Vec<u64> = map
                .nodes_in_rect(Vec2::new(min_x, min_z), Vec2::new(max_x, max_z))
                .into_iter()
                .filter_map(|id| map.node(id).map(|node| node.uid))
                .collect();
            uids.sort_unstable();
            for uid in uids {
                println!("{uid:#018x}");
            }
        }
    }
    Ok(())
}
