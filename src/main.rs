//! LevelUp save tool
//!
//! Inspects and manages save slots from the command line.

#[cfg(not(target_arch = "wasm32"))]
use anyhow::{Context, Result};
#[cfg(not(target_arch = "wasm32"))]
use clap::{Parser, Subcommand};
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use levelup_save::migration::MigrationOutcome;
#[cfg(not(target_arch = "wasm32"))]
use levelup_save::persistence::{PlayerRank, RANK_NONE, SaveError, encode};
#[cfg(not(target_arch = "wasm32"))]
use levelup_save::prefs::JsonSettingsFile;
#[cfg(not(target_arch = "wasm32"))]
use levelup_save::{SaveConfig, SaveSession, migrate_legacy};

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser)]
#[command(name = "levelup-save")]
#[command(about = "Inspect and manage LevelUp save slots", long_about = None)]
struct Cli {
    /// Save system config (JSON)
    #[arg(long, default_value = "save_config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Subcommand)]
enum Commands {
    /// List slots and their completion stars
    List,

    /// Print a slot's record as JSON
    Show { slot: u32 },

    /// Print a slot's completion summary
    Summary { slot: u32 },

    /// Delete a slot's file
    Delete { slot: u32 },

    /// Copy one slot over another
    Copy { from: u32, to: u32 },

    /// Export a slot for sharing or backup
    Export {
        slot: u32,

        /// Destination directory (defaults to the configured export dir)
        #[arg(long)]
        out: Option<PathBuf>,

        /// File name without extension
        #[arg(long)]
        name: Option<String>,
    },

    /// Import an exported save into a slot
    Import { slot: u32, file: PathBuf },

    /// Convert legacy settings keys into a save slot (runs once)
    Migrate,
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = SaveConfig::load(&cli.config);
    config.validate();
    let mut session = SaveSession::new(config.file_store());

    match cli.command {
        Commands::List => {
            let used = session.used_slots()?;
            let shown = used
                .last()
                .map_or(config.slot_count, |last| config.slot_count.max(last + 1));
            for slot in 0..shown {
                match session.peek(slot) {
                    Ok(Some(record)) => {
                        let summary = levelup_save::session::summarize(&record, &config.levels);
                        println!(
                            "Slot {}: {:<12} {}/{} levels, {} stars{}",
                            slot,
                            record.profile_name,
                            summary.completed_levels,
                            summary.total_levels,
                            summary.star_count(),
                            if record.checkpoint.has_checkpoint {
                                format!(", checkpoint in {}", record.checkpoint.level_id)
                            } else {
                                String::new()
                            }
                        );
                    }
                    Ok(None) => println!("Slot {}: empty", slot),
                    Err(SaveError::Corrupt { .. }) => println!("Slot {}: unreadable", slot),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Commands::Show { slot } => {
            let record = session
                .peek(slot)?
                .with_context(|| format!("slot {} is empty", slot))?;
            println!("{}", encode(&record)?);
        }

        Commands::Summary { slot } => {
            anyhow::ensure!(session.slot_exists(slot), "slot {} is empty", slot);
            session.load(slot)?;
            let record = session.active();
            let summary = session.build_summary(&config.levels);
            println!("{} (slot {})", record.profile_name, slot);
            println!(
                "  Levels completed:  {}/{}",
                summary.completed_levels, summary.total_levels
            );
            println!(
                "  Perfect levels:    {}/{}",
                summary.perfect_levels, summary.total_levels
            );
            println!(
                "  Collectibles:      {}/{}",
                summary.collected_total, summary.collectible_max
            );
            println!("  Stars:             {}/3", summary.star_count());
            for level in &config.levels {
                let Some(progress) = record.level(&level.level_id) else {
                    println!("  {:<8} -", level.level_id);
                    continue;
                };
                let rank = match progress.highest_rank {
                    RANK_NONE => "-",
                    value => PlayerRank::from_i32(value).map_or("?", |r| r.as_str()),
                };
                let best = if progress.best_time_ms > 0.0 {
                    format!("{:.2}s", progress.best_time_ms / 1000.0)
                } else {
                    "-".to_string()
                };
                println!(
                    "  {:<8} {} rank {} best {} high score {} collectibles {}/{}",
                    level.level_id,
                    if progress.perfect {
                        "perfect"
                    } else if progress.completed {
                        "cleared"
                    } else {
                        "open   "
                    },
                    rank,
                    best,
                    progress.high_score,
                    progress.collected_count,
                    progress.collectibles.len()
                );
            }
        }

        Commands::Delete { slot } => {
            if session.delete(slot)? {
                println!("Deleted slot {}", slot);
            } else {
                println!("Slot {} was already empty", slot);
            }
        }

        Commands::Copy { from, to } => {
            session
                .copy_slot(from, to)
                .with_context(|| format!("copying slot {} to slot {}", from, to))?;
            println!("Copied slot {} to slot {}", from, to);
        }

        Commands::Export { slot, out, name } => {
            let dest = out.unwrap_or_else(|| config.export_dir.clone());
            let path = session
                .export(slot, &dest, name.as_deref())
                .with_context(|| format!("exporting slot {}", slot))?;
            println!("Exported slot {} to {}", slot, path.display());
        }

        Commands::Import { slot, file } => {
            session
                .import(slot, &file, false)
                .with_context(|| format!("importing {}", file.display()))?;
            println!("Imported {} into slot {}", file.display(), slot);
        }

        Commands::Migrate => {
            let mut settings = JsonSettingsFile::open(&config.settings_file)?;
            match migrate_legacy(&mut settings, &mut session, &config.levels)? {
                MigrationOutcome::AlreadyMigrated => println!("Legacy progress already migrated"),
                MigrationOutcome::NothingToMigrate => println!("No legacy progress found"),
                MigrationOutcome::Migrated(report) => println!(
                    "Migrated legacy progress into slot {} (checkpoint: {}, levels: {}, modifiers: {})",
                    report.slot, report.checkpoint, report.levels, report.modifiers
                ),
            }
        }
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The browser build is used as a library only
}
