use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use galleryd::commands;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "galleryd")]
#[command(about = "Image gallery search daemon with filtered and vector retrieval")]
#[command(version)]
struct Cli {
   #[arg(long, env = "GALLERYD_TOKEN", help = "Bearer token for authenticated requests")]
   token: Option<String>,

   #[command(subcommand)]
   command: Commands,
}

#[derive(Subcommand)]
enum Commands {
   Serve {
      #[arg(long, help = "Gallery snapshot to serve (default: from config)")]
      data: Option<PathBuf>,
   },

   Search {
      #[arg(help = "Free-text query over titles, captions, alt text, and tags")]
      query: Option<String>,

      #[arg(short = 't', long, help = "Comma-separated tag names (all must match)")]
      tags: Option<String>,

      #[arg(long, help = "Tag category id")]
      category: Option<Uuid>,

      #[arg(short = 'u', long, help = "Only images owned by this user id")]
      user: Option<Uuid>,

      #[arg(long, help = "Only images in this album id")]
      album: Option<Uuid>,

      #[arg(long, help = "Camera make substring")]
      camera_make: Option<String>,

      #[arg(long, help = "Camera model substring")]
      camera_model: Option<String>,

      #[arg(long, help = "Created on or after (YYYY-MM-DD)")]
      date_from: Option<NaiveDate>,

      #[arg(long, help = "Created on or before (YYYY-MM-DD)")]
      date_to: Option<NaiveDate>,

      #[arg(long, help = "License filter (exact)")]
      license: Option<String>,

      #[arg(long, help = "Sort field: created_at, updated_at, title, views")]
      sort_by: Option<String>,

      #[arg(long, help = "Sort order: asc or desc")]
      sort_order: Option<String>,

      #[arg(short = 'p', long, help = "Page number")]
      page: Option<u32>,

      #[arg(short = 'n', long, help = "Results per page (max 100)")]
      limit: Option<u32>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   Similar {
      #[arg(help = "Text to find visually/semantically similar images for")]
      query: Option<String>,

      #[arg(long, help = "Image file to search by (if the provider supports it)")]
      image: Option<PathBuf>,

      #[arg(short = 'n', long, help = "Maximum matches (max 50)")]
      limit: Option<u32>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   Suggest {
      #[arg(help = "Prefix to complete (at least 2 characters)")]
      q: String,

      #[arg(long = "type", help = "Restrict to: tags, users, cameras")]
      kind: Option<String>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   Status,

   Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
   tracing_subscriber::fmt()
      .with_env_filter(
         tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::WARN.into()),
      )
      .init();

   let cli = Cli::parse();

   match cli.command {
      Commands::Serve { data } => commands::serve::execute(data).await,
      Commands::Search {
         query,
         tags,
         category,
         user,
         album,
         camera_make,
         camera_model,
         date_from,
         date_to,
         license,
         sort_by,
         sort_order,
         page,
         limit,
         json,
      } => {
         commands::search::execute(
            query,
            tags,
            category,
            user,
            album,
            camera_make,
            camera_model,
            date_from,
            date_to,
            license,
            sort_by,
            sort_order,
            page,
            limit,
            cli.token,
            json,
         )
         .await
      },
      Commands::Similar { query, image, limit, json } => {
         commands::similar::execute(query, image, limit, cli.token, json).await
      },
      Commands::Suggest { q, kind, json } => {
         commands::suggest::execute(q, kind, cli.token, json).await
      },
      Commands::Status => commands::status::execute().await,
      Commands::Stop => commands::stop::execute().await,
   }
}
