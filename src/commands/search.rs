use anyhow::{Result, bail};
use chrono::NaiveDate;
use console::style;

use crate::{
   ipc::{self, Request, Response},
   types::{ImageDetail, Privacy, SearchQuery},
};

#[allow(clippy::too_many_arguments, reason = "one flag per filter dimension")]
pub async fn execute(
   query: Option<String>,
   tags: Option<String>,
   category: Option<uuid::Uuid>,
   user: Option<uuid::Uuid>,
   album: Option<uuid::Uuid>,
   camera_make: Option<String>,
   camera_model: Option<String>,
   date_from: Option<NaiveDate>,
   date_to: Option<NaiveDate>,
   license: Option<String>,
   sort_by: Option<String>,
   sort_order: Option<String>,
   page: Option<u32>,
   limit: Option<u32>,
   token: Option<String>,
   json: bool,
) -> Result<()> {
   let search = SearchQuery {
      q: query,
      tags: tags.map(|t| t.split(',').map(|s| s.trim().to_string()).collect()),
      category_id: category,
      user_id: user,
      album_id: album,
      camera_make,
      camera_model,
      date_from,
      date_to,
      license,
      sort_by,
      sort_order,
      page,
      limit,
   };

   let response = ipc::request(&Request::Search { token, query: search }).await?;

   match response {
      Response::Search(result) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
         }

         if result.results.is_empty() {
            println!("{}", style("No results").dim());
            return Ok(());
         }

         for detail in &result.results {
            print_image(detail);
         }
         let p = &result.pagination;
         println!(
            "{}",
            style(format!(
               "page {}/{} ({} total)",
               p.page,
               p.total_pages.max(1),
               p.total
            ))
            .dim()
         );
         Ok(())
      },
      Response::Error(body) => bail!("{} ({})", body.message, body.status),
      _ => bail!("unexpected response from server"),
   }
}

pub fn print_image(detail: &ImageDetail) {
   let privacy = match detail.image.privacy {
      Privacy::Public => style("public").green(),
      Privacy::Unlisted => style("unlisted").yellow(),
      Privacy::Private => style("private").red(),
   };
   let tags = if detail.tags.is_empty() {
      String::new()
   } else {
      let names: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
      format!(" [{}]", names.join(", "))
   };
   println!(
      "{} {} {} {}{}",
      style(&detail.image.title).bold(),
      style("by").dim(),
      detail.owner.username,
      privacy,
      style(tags).cyan()
   );
}
