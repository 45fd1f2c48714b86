use anyhow::{Result, bail};
use console::style;

use crate::{
   ipc::{self, Request, Response},
   types::Suggestion,
};

pub async fn execute(
   q: String,
   kind: Option<String>,
   token: Option<String>,
   json: bool,
) -> Result<()> {
   let response = ipc::request(&Request::Suggestions { token, q, kind }).await?;

   match response {
      Response::Suggestions(result) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
         }

         if result.suggestions.is_empty() {
            println!("{}", style("No suggestions").dim());
            return Ok(());
         }

         for suggestion in &result.suggestions {
            match suggestion {
               Suggestion::Tag { display, count, .. } => {
                  println!("{} {} {}", style("tag").cyan(), display, style(format!("({count})")).dim());
               },
               Suggestion::User { display, .. } => {
                  println!("{} {}", style("user").green(), display);
               },
               Suggestion::Camera { display, .. } => {
                  println!("{} {}", style("camera").yellow(), display);
               },
            }
         }
         Ok(())
      },
      Response::Error(body) => bail!("{} ({})", body.message, body.status),
      _ => bail!("unexpected response from server"),
   }
}
