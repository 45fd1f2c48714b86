use anyhow::{Context, Result};
use console::style;
use tokio::net::UnixStream;

use crate::{
   config,
   ipc::{self, Request, Response},
};

pub async fn execute() -> Result<()> {
   let socket_path = config::socket_path();

   if !socket_path.exists() {
      println!("{}", style("No server running").yellow());
      return Ok(());
   }

   let mut buffer = ipc::SocketBuffer::new();

   match UnixStream::connect(socket_path).await {
      Ok(mut stream) => {
         buffer.send(&mut stream, &Request::Shutdown).await?;

         match buffer.recv(&mut stream).await {
            Ok(Response::Shutdown { success: true }) => {
               println!("{}", style("Server stopped").green());
            },
            Ok(_) => {
               println!("{}", style("Unexpected response from server").yellow());
            },
            Err(_) => {
               println!("{}", style("Server stopped").green());
            },
         }
      },
      Err(_) => {
         std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
         println!("{}", style("Removed stale socket").yellow());
      },
   }

   Ok(())
}
