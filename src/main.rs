//! Event Gallery
//!
//! Command-line front end for the events persistence core. Every command
//! opens the backend chosen by `STORE_BACKEND` (the JSON document by
//! default, or the database with migrations applied), runs one operation
//! and prints the result as JSON.
//!
//! Usage:
//!   `event-gallery list --visible`
//!   `event-gallery create --title "Spring Fest" --date 2024-03-01 --category Cultural --visible`
//!   `event-gallery upload evt_... ./poster.png --hero`
//!   `event-gallery import data/events.json`

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use console::style;
use event_gallery::common::state::AppState;
use event_gallery::config::Config;
use event_gallery::events::hero;
use event_gallery::events::import::{ImportDocument, ImportSummary};
use event_gallery::events::models::{
    AdminEventChanges, EventChanges, ImageChanges, NewEvent, parse_event_date,
};
use event_gallery::images::services::ImageUpload;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "event-gallery", version, about = "Manage events and their image galleries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List events without their galleries
    List {
        /// Only events published to the public site
        #[arg(long)]
        visible: bool,
    },
    /// Show one event with its gallery
    Show {
        id: String,
        /// Treat hidden events as missing
        #[arg(long)]
        public: bool,
    },
    /// Create an event (hidden unless --visible is given)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(long)]
        category: String,
        #[arg(long)]
        visible: bool,
    },
    /// Change some fields of an event
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        visible: Option<bool>,
    },
    /// Delete an event, its image records and its image files
    Delete { id: String },
    /// Publish or hide an event
    Visibility {
        id: String,
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        visible: bool,
    },
    /// Store an image file and attach it to an event
    Upload {
        event_id: String,
        file: PathBuf,
        #[arg(long)]
        alt: Option<String>,
        /// Make the image the hero poster
        #[arg(long)]
        hero: bool,
    },
    /// Change the alt text or hero flag of an image
    UpdateImage {
        event_id: String,
        image_id: String,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        hero: Option<bool>,
    },
    /// Delete an image record and its file
    RemoveImage { event_id: String, image_id: String },
    /// Make an image the hero poster of its event
    SetHero { event_id: String, image_id: String },
    /// Upsert every event of an `{ "events": [...] }` document
    Import { file: PathBuf },
    /// Report events whose gallery breaks the hero rules
    Check,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    parse_event_date(raw).map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn not_found(what: &str, id: &str) -> ExitCode {
    eprintln!("{} {what} '{id}' not found", style("✗").red().bold());
    ExitCode::FAILURE
}

fn done(message: &str) -> ExitCode {
    eprintln!("{} {message}", style("✓").green().bold());
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "event_gallery=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::debug!(
        app = %config.app_name,
        deployment = %config.deployment,
        backend = ?config.store_backend,
        "Loaded configuration"
    );
    let state = AppState::from_config(config).await?;

    run(&state, cli.command).await
}

#[allow(clippy::too_many_lines)]
async fn run(state: &AppState, command: Command) -> anyhow::Result<ExitCode> {
    let code = match command {
        Command::List { visible } => {
            let events = if visible {
                state.events.get_visible_events().await?
            } else {
                state.events.list_events().await?
            };
            print_json(&events)?;
            ExitCode::SUCCESS
        }
        Command::Show { id, public } => {
            let event = if public {
                state.events.get_visible_event(&id).await?
            } else {
                state.events.get_event(&id).await?
            };
            match event {
                Some(event) => {
                    print_json(&event)?;
                    ExitCode::SUCCESS
                }
                None => not_found("event", &id),
            }
        }
        Command::Create {
            title,
            description,
            date,
            category,
            visible,
        } => {
            let new_event = NewEvent {
                title,
                description,
                date,
                category,
            };
            let event = state
                .admin
                .create_event_admin(new_event, visible.then_some(true))
                .await?;
            print_json(&event)?;
            done(&format!("Created event {}", event.id))
        }
        Command::Update {
            id,
            title,
            description,
            date,
            category,
            visible,
        } => {
            let changes = AdminEventChanges {
                content: EventChanges {
                    title,
                    description,
                    date,
                    category,
                },
                visible,
            };
            match state.admin.update_event_admin(&id, changes).await? {
                Some(event) => {
                    print_json(&event)?;
                    done(&format!("Updated event {id}"))
                }
                None => not_found("event", &id),
            }
        }
        Command::Delete { id } => {
            if state.images.delete_event(&id).await? {
                done(&format!("Deleted event {id}"))
            } else {
                not_found("event", &id)
            }
        }
        Command::Visibility { id, visible } => {
            if state.admin.set_event_visibility(&id, visible).await? {
                let label = if visible { "visible" } else { "hidden" };
                done(&format!("Event {id} is now {label}"))
            } else {
                not_found("event", &id)
            }
        }
        Command::Upload {
            event_id,
            file,
            alt,
            hero,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let original_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let upload = ImageUpload { alt, is_hero: hero };
            match state
                .images
                .save_image(&event_id, &bytes, &original_name, upload)
                .await?
            {
                Some(image) => {
                    print_json(&image)?;
                    done(&format!(
                        "Stored {}",
                        state.images.image_path(&image.filename).display()
                    ))
                }
                None => not_found("event", &event_id),
            }
        }
        Command::UpdateImage {
            event_id,
            image_id,
            alt,
            hero,
        } => {
            let changes = ImageChanges { alt, is_hero: hero };
            match state
                .events
                .update_image(&event_id, &image_id, changes)
                .await?
            {
                Some(image) => {
                    print_json(&image)?;
                    ExitCode::SUCCESS
                }
                None => not_found("image", &image_id),
            }
        }
        Command::RemoveImage { event_id, image_id } => {
            if state.images.delete_image(&event_id, &image_id).await? {
                done(&format!("Removed image {image_id}"))
            } else {
                not_found("image", &image_id)
            }
        }
        Command::SetHero { event_id, image_id } => {
            if state.events.set_hero_poster(&event_id, &image_id).await? {
                done(&format!("Image {image_id} is now the hero poster"))
            } else {
                not_found("image", &image_id)
            }
        }
        Command::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let document = ImportDocument::from_slice(&bytes)?;
            let summary = import_with_progress(state, document).await?;
            print_json(&summary)?;
            done(&format!(
                "Imported {} events ({} skipped), {} images ({} skipped)",
                summary.events, summary.skipped_events, summary.images, summary.skipped_images
            ))
        }
        Command::Check => {
            let mut broken = 0;
            for summary in state.events.list_events().await? {
                let Some(event) = state.events.get_event(&summary.id).await? else {
                    continue;
                };
                if let Some(problem) = hero::violation(&event) {
                    broken += 1;
                    eprintln!("{} {}: {problem}", style("✗").red().bold(), event.id);
                }
            }
            if broken == 0 {
                done("All galleries satisfy the hero rules")
            } else {
                eprintln!("{broken} event(s) need attention");
                ExitCode::FAILURE
            }
        }
    };
    Ok(code)
}

async fn import_with_progress(
    state: &AppState,
    document: ImportDocument,
) -> anyhow::Result<ImportSummary> {
    let pb = ProgressBar::new(document.events.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("#>-"),
    );

    let mut summary = ImportSummary::default();
    for imported in document.events {
        pb.set_message(imported.id.clone().unwrap_or_default());
        let outcome = state.events.import_event(imported).await?;
        summary.record(&outcome);
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok(summary)
}
