// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use shari::backends::camera::{MovieResolution, ZoomFactor};
use shari::constants::timing;
use shari::storage::ExportFormat;

mod cli;

#[derive(Parser)]
#[command(name = "shari")]
#[command(about = "Tasting notes for restaurant dishes")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the camera and its formats
    List,

    /// Take photos into ~/Pictures/shari
    Photo {
        /// Number of photos to take
        #[arg(short, long, default_value = "1")]
        count: u32,

        /// Zoom step: 1, 1.5 or 2
        #[arg(short, long)]
        zoom: Option<ZoomFactor>,
    },

    /// Record a video into ~/Videos/shari
    Video {
        /// Recording duration in seconds
        #[arg(short, long, default_value_t = timing::DEFAULT_VIDEO_DURATION_SECS)]
        duration: u64,

        /// Resolution class: 1080p or 4k
        #[arg(short, long)]
        resolution: Option<MovieResolution>,

        /// Frame rate: 30 or 60
        #[arg(short, long)]
        fps: Option<u32>,
    },

    /// Manage restaurants
    Restaurant {
        #[command(subcommand)]
        action: RestaurantAction,
    },

    /// Manage dishes
    Dish {
        #[command(subcommand)]
        action: DishAction,
    },

    /// Export tasting notes
    Export {
        /// Restaurant id or name (default: every restaurant)
        restaurant: Option<String>,

        /// Output format: md or csv
        #[arg(short, long, default_value = "md")]
        format: ExportFormat,

        /// Remove previously exported files instead
        #[arg(long)]
        clean: bool,
    },

    /// Show the taste taxonomy
    Tastes,

    /// Show or change settings
    Settings {
        /// Delete without confirmation
        #[arg(long)]
        delete_immediate: Option<bool>,
    },
}

#[derive(Subcommand)]
enum RestaurantAction {
    /// Add a restaurant
    Add { name: String },

    /// List restaurants and their dishes
    List,

    /// Delete a restaurant by id or name
    Delete {
        restaurant: String,

        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DishAction {
    /// Add a dish to a restaurant
    Add {
        /// Restaurant id or name
        restaurant: String,

        name: String,

        /// Taste descriptor; repeat for several
        #[arg(short, long = "taste")]
        tastes: Vec<String>,

        /// Photograph the dish and keep a thumbnail
        #[arg(short, long)]
        photo: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=shari=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Photo { count, zoom } => cli::take_photo(count, zoom),
        Commands::Video {
            duration,
            resolution,
            fps,
        } => cli::record_video(duration, resolution, fps),
        Commands::Restaurant { action } => match action {
            RestaurantAction::Add { name } => cli::add_restaurant(&name),
            RestaurantAction::List => cli::list_restaurants(),
            RestaurantAction::Delete { restaurant, yes } => cli::delete_restaurant(&restaurant, yes),
        },
        Commands::Dish { action } => match action {
            DishAction::Add {
                restaurant,
                name,
                tastes,
                photo,
            } => cli::add_dish(&restaurant, &name, tastes, photo),
        },
        Commands::Export {
            restaurant,
            format,
            clean,
        } => cli::export(restaurant.as_deref(), format, clean),
        Commands::Tastes => cli::list_tastes(),
        Commands::Settings { delete_immediate } => cli::settings(delete_immediate),
    }
}
