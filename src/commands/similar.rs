use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use console::style;

use crate::{
   commands::search::print_image,
   ipc::{self, Request, Response},
   types::{VectorQuery, VectorQueryKind},
};

pub async fn execute(
   query: Option<String>,
   image: Option<PathBuf>,
   limit: Option<u32>,
   token: Option<String>,
   json: bool,
) -> Result<()> {
   let vector_query = match (&query, &image) {
      (_, Some(path)) => {
         let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
         VectorQuery {
            kind: VectorQueryKind::Image,
            text: None,
            image: Some(bytes),
            limit,
         }
      },
      (Some(text), None) => VectorQuery {
         kind: VectorQueryKind::Text,
         text: Some(text.clone()),
         image: None,
         limit,
      },
      (None, None) => bail!("provide a text query or --image"),
   };

   let response = ipc::request(&Request::VectorSearch { token, query: vector_query }).await?;

   match response {
      Response::Vector(result) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
         }

         if result.results.is_empty() {
            println!("{}", style("No matches").dim());
            return Ok(());
         }

         for scored in &result.results {
            print!("{} ", style(format!("{:.3}", scored.similarity)).magenta());
            print_image(&scored.detail);
         }
         println!("{}", style(format!("{} matches", result.total_matches)).dim());
         Ok(())
      },
      Response::Error(body) => bail!("{} ({})", body.message, body.status),
      _ => bail!("unexpected response from server"),
   }
}
