//! `lacquer` command-line interface.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use lacquer_shared::{Finish, Placement, Polish, ResolvedManicure, Settings, Tool, ToolKind};
use lacquer_store::LocalPersistence;
use serde::Serialize;

use crate::commands::{backup, manicure, polish, settings, sync, tool};
use crate::config::ClientConfig;
use crate::runtime::{boot, RuntimeHandle};

#[derive(Debug, Parser)]
#[command(
    name = "lacquer",
    about = "Catalog nail polishes, tools and manicures, optionally shared across devices",
    version
)]
pub struct Cli {
    /// SQLite database file. Overrides `LACQUER_DB_PATH`.
    #[arg(long = "db", value_name = "path", global = true)]
    pub db: Option<PathBuf>,
    /// Print records as JSON instead of one line each.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage polishes.
    #[command(subcommand)]
    Polish(PolishCommand),
    /// Manage tools.
    #[command(subcommand)]
    Tool(ToolCommand),
    /// Log manicures.
    #[command(subcommand)]
    Mani(ManiCommand),
    /// Show or change the wall layout, theme and sync key.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Export or import a JSON backup.
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Delete everything and restore default settings.
    Reset {
        /// Required, there is no undo.
        #[arg(long)]
        yes: bool,
    },
    /// Mirror the collection to `LACQUER_REMOTE_URL` until Ctrl+C.
    Sync {
        /// Set the household sync key before starting.
        #[arg(long, value_name = "key")]
        key: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct SlotArgs {
    #[arg(long, value_name = "name")]
    pub wall: Option<String>,
    #[arg(long, value_name = "n")]
    pub shelf: Option<u32>,
    #[arg(long, value_name = "n")]
    pub slot: Option<u32>,
}

impl SlotArgs {
    fn placement(&self) -> Result<Option<Placement>> {
        match (&self.wall, self.shelf, self.slot) {
            (None, None, None) => Ok(None),
            (Some(wall), Some(shelf), Some(slot)) => Ok(Some(Placement::new(wall.trim(), shelf, slot))),
            _ => bail!("--wall, --shelf and --slot must be given together"),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PolishCommand {
    Add {
        #[arg(long, default_value = "")]
        brand: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        code: String,
        #[arg(long, default_value = "")]
        barcode: String,
        /// Hex color, e.g. `#f4c2c2`.
        #[arg(long, default_value = "")]
        color: String,
        #[arg(long, default_value = "other")]
        finish: Finish,
        #[arg(long, default_value = "")]
        collection: String,
        #[arg(long = "tag", value_name = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, value_name = "path")]
        image: Option<PathBuf>,
        #[command(flatten)]
        slot: SlotArgs,
    },
    List {
        /// Substring of brand, name, code or collection.
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long)]
        finish: Option<Finish>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        wall: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        finish: Option<Finish>,
        #[arg(long)]
        collection: Option<String>,
        /// Replaces every tag.
        #[arg(long = "tag", value_name = "tag")]
        tags: Option<Vec<String>>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, value_name = "path", conflicts_with = "remove_image")]
        image: Option<PathBuf>,
        #[arg(long)]
        remove_image: bool,
    },
    /// Put a polish in a slot, or take it off the wall with `--off`.
    Move {
        id: String,
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long, conflicts_with_all = ["wall", "shelf", "slot"])]
        off: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ToolCommand {
    Add {
        name: String,
        #[arg(long = "type", default_value = "other")]
        kind: ToolKind,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, value_name = "path")]
        image: Option<PathBuf>,
    },
    List {
        #[arg(long = "type")]
        kind: Option<ToolKind>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ManiCommand {
    Add {
        /// Defaults to today.
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "polish", value_name = "id")]
        polish_ids: Vec<String>,
        #[arg(long = "tool", value_name = "id")]
        tool_ids: Vec<String>,
        #[arg(long = "step", value_name = "text")]
        steps: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, value_name = "path")]
        image: Option<PathBuf>,
        /// 1 to 5.
        #[arg(long, default_value_t = 3)]
        rating: u8,
        #[arg(long, default_value_t = 0)]
        wear_days: u32,
    },
    List,
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        walls: Option<u32>,
        #[arg(long)]
        shelves: Option<u32>,
        #[arg(long)]
        slots: Option<u32>,
        /// Comma separated; blanks fall back to letters.
        #[arg(long, value_delimiter = ',')]
        wall_names: Option<Vec<String>>,
        /// Empty string turns sync off.
        #[arg(long)]
        sync_key: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    Export {
        /// Defaults to `LACQUER_BACKUP_DIR`, then the data directory.
        #[arg(long, value_name = "path")]
        dir: Option<PathBuf>,
    },
    /// Replace all local data with a backup file.
    Import {
        file: PathBuf,
    },
}

/// Run one parsed command against the configured database.
pub async fn execute(cli: Cli, mut config: ClientConfig) -> Result<()> {
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    let persistence = LocalPersistence::new(config.open_database()?);

    // Import writes storage directly, so it runs before anything is loaded.
    if let Command::Backup(BackupCommand::Import { file }) = &cli.command {
        let state = backup::import_from(&persistence, file).await?;
        println!(
            "Imported {} polishes, {} tools, {} manicures from {}",
            state.polishes.len(),
            state.tools.len(),
            state.manicures.len(),
            file.display()
        );
        return Ok(());
    }

    let runtime = boot(persistence);
    let result = run_command(&runtime, &config, cli.command, cli.json).await;
    runtime.shutdown().await;
    result
}

async fn run_command(runtime: &RuntimeHandle, config: &ClientConfig, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Polish(cmd) => run_polish(runtime, cmd, json).await,
        Command::Tool(cmd) => run_tool(runtime, cmd, json).await,
        Command::Mani(cmd) => run_mani(runtime, cmd, json).await,
        Command::Settings(SettingsCommand::Show) => {
            print_one(&runtime.state().settings, json, settings_block)
        }
        Command::Settings(SettingsCommand::Set {
            theme,
            walls,
            shelves,
            slots,
            wall_names,
            sync_key,
        }) => {
            let change = settings::SettingsChange {
                color_theme: theme,
                wall_count: walls,
                shelves_per_wall: shelves,
                slots_per_shelf: slots,
                wall_names,
                sync_key,
            };
            let updated = settings::update_settings(runtime, change).await?;
            print_one(&updated, json, settings_block)
        }
        Command::Backup(BackupCommand::Export { dir }) => {
            let dir = match dir {
                Some(dir) => dir,
                None => config.backup_dir()?,
            };
            let file = backup::export_to(runtime, &dir).await?;
            println!("{}", file.display());
            Ok(())
        }
        Command::Backup(BackupCommand::Import { .. }) => {
            bail!("backup import must run before the state is loaded")
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset deletes every record; pass --yes to confirm");
            }
            settings::reset(runtime).await
        }
        Command::Sync { key } => sync::run_sync(runtime, config, key).await,
    }
}

async fn run_polish(runtime: &RuntimeHandle, cmd: PolishCommand, json: bool) -> Result<()> {
    match cmd {
        PolishCommand::Add {
            brand,
            name,
            code,
            barcode,
            color,
            finish,
            collection,
            tags,
            notes,
            image,
            slot,
        } => {
            if brand.trim().is_empty() && name.trim().is_empty() {
                bail!("give the polish a --brand or a --name");
            }
            let input = polish::NewPolish {
                brand,
                name,
                code,
                barcode,
                color,
                finish,
                collection,
                tags,
                notes,
                image,
                placement: slot.placement()?,
            };
            let added = polish::add_polish(runtime, input).await?;
            print_one(&added, json, polish_line)
        }
        PolishCommand::List {
            query,
            finish,
            tag,
            wall,
        } => {
            let state = runtime.state();
            let filter = polish::PolishFilter {
                query,
                finish,
                tag,
                wall,
            };
            print_many(&polish::list_polishes(&state, &filter), json, |p| polish_line(p))
        }
        PolishCommand::Edit {
            id,
            brand,
            name,
            code,
            barcode,
            color,
            finish,
            collection,
            tags,
            notes,
            image,
            remove_image,
        } => {
            let edit = polish::PolishEdit {
                brand,
                name,
                code,
                barcode,
                color,
                finish,
                collection,
                tags,
                notes,
                image,
                remove_image,
            };
            let edited = polish::edit_polish(runtime, &id, edit).await?;
            print_one(&edited, json, polish_line)
        }
        PolishCommand::Move { id, slot, off } => {
            let placement = slot.placement()?;
            if placement.is_none() && !off {
                bail!("give --wall, --shelf and --slot, or --off");
            }
            let moved = polish::move_polish(runtime, &id, placement).await?;
            print_one(&moved, json, polish_line)
        }
        PolishCommand::Delete { id } => report_delete("polish", &id, polish::delete_polish(runtime, &id).await?),
    }
}

async fn run_tool(runtime: &RuntimeHandle, cmd: ToolCommand, json: bool) -> Result<()> {
    match cmd {
        ToolCommand::Add {
            name,
            kind,
            brand,
            notes,
            image,
        } => {
            let input = tool::NewTool {
                name,
                kind,
                brand,
                notes,
                image,
            };
            let added = tool::add_tool(runtime, input).await?;
            print_one(&added, json, tool_line)
        }
        ToolCommand::List { kind } => {
            let state = runtime.state();
            print_many(&tool::list_tools(&state, kind), json, |t| tool_line(t))
        }
        ToolCommand::Delete { id } => report_delete("tool", &id, tool::delete_tool(runtime, &id).await?),
    }
}

async fn run_mani(runtime: &RuntimeHandle, cmd: ManiCommand, json: bool) -> Result<()> {
    match cmd {
        ManiCommand::Add {
            date,
            title,
            polish_ids,
            tool_ids,
            steps,
            notes,
            image,
            rating,
            wear_days,
        } => {
            let mut input = manicure::NewManicure::on(date.unwrap_or_else(|| Utc::now().date_naive()));
            input.title = title;
            input.polish_ids = polish_ids;
            input.tool_ids = tool_ids;
            input.steps = steps;
            input.notes = notes;
            input.image = image;
            input.rating = rating;
            input.wear_days = wear_days;

            let added = manicure::add_manicure(runtime, input).await?;
            let state = runtime.state();
            print_one(&added, json, |m| manicure_line(&state.resolve_manicure(m)))
        }
        ManiCommand::List => {
            let state = runtime.state();
            let resolved = manicure::list_manicures(&state);
            if json {
                let raw: Vec<_> = resolved.iter().map(|r| r.manicure).collect();
                println!("{}", serde_json::to_string_pretty(&raw)?);
                return Ok(());
            }
            for entry in &resolved {
                println!("{}", manicure_line(entry));
            }
            Ok(())
        }
        ManiCommand::Delete { id } => report_delete("manicure", &id, manicure::delete_manicure(runtime, &id).await?),
    }
}

fn report_delete(kind: &str, id: &str, existed: bool) -> Result<()> {
    if existed {
        println!("Deleted {kind} {id}");
    } else {
        println!("No {kind} with id {id}");
    }
    Ok(())
}

fn print_one<T: Serialize + ?Sized>(value: &T, json: bool, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", line(value));
    }
    Ok(())
}

fn print_many<T: Serialize>(values: &[&T], json: bool, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(values)?);
    } else {
        for value in values {
            println!("{}", line(value));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plain-text rendering
// ---------------------------------------------------------------------------

pub fn polish_line(polish: &Polish) -> String {
    let mut line = format!("{}  {} [{}]", polish.id, polish.label(), polish.finish);
    if !polish.code.is_empty() {
        line.push_str(&format!(" #{}", polish.code));
    }
    if let Some(p) = &polish.placement {
        line.push_str(&format!(" @ {}/{}/{}", p.wall, p.shelf, p.position));
    }
    if !polish.tags.is_empty() {
        line.push_str(&format!(" ({})", polish.tags.join(", ")));
    }
    line
}

pub fn tool_line(tool: &Tool) -> String {
    match &tool.brand {
        Some(brand) => format!("{}  {} [{}] by {}", tool.id, tool.name, tool.kind, brand),
        None => format!("{}  {} [{}]", tool.id, tool.name, tool.kind),
    }
}

pub fn manicure_line(entry: &ResolvedManicure<'_>) -> String {
    let m = entry.manicure;
    let title = m.title.as_deref().unwrap_or("Manicure");
    let polishes: Vec<String> = entry.polishes.iter().map(|p| p.label()).collect();
    let mut line = format!(
        "{}  {} {} {}/5",
        m.id,
        m.date,
        title,
        m.rating
    );
    if m.wear_days > 0 {
        line.push_str(&format!(", worn {} days", m.wear_days));
    }
    if !polishes.is_empty() {
        line.push_str(&format!(": {}", polishes.join(" + ")));
    }
    line
}

pub fn settings_block(settings: &Settings) -> String {
    let sync = settings.active_sync_key().unwrap_or("off");
    format!(
        "theme:  {}\nwalls:  {} ({})\nshelves per wall: {}\nslots per shelf:  {}\nsync:   {}",
        settings.color_theme,
        settings.wall_count,
        settings.wall_names.join(", "),
        settings.shelves_per_wall,
        settings.slots_per_shelf,
        sync
    )
}
