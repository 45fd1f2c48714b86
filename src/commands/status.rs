use anyhow::Result;
use console::style;
use tokio::net::UnixStream;

use crate::{
   config,
   ipc::{self, Request, Response},
};

pub async fn execute() -> Result<()> {
   let socket_path = config::socket_path();

   if !socket_path.exists() {
      println!("{}", style("Server not running").dim());
      return Ok(());
   }

   let mut buffer = ipc::SocketBuffer::new();
   match UnixStream::connect(socket_path).await {
      Ok(mut stream) => {
         if buffer.send(&mut stream, &Request::Health).await.is_err() {
            println!("{} {}", style("●").yellow(), style("unresponsive").dim());
            return Ok(());
         }

         match buffer.recv(&mut stream).await {
            Ok(Response::Health { status }) => {
               println!(
                  "{} serving {} images, up {}s",
                  style("●").green(),
                  status.images,
                  status.uptime_secs
               );
            },
            _ => {
               println!("{} {}", style("●").yellow(), style("unknown state").dim());
            },
         }
      },
      Err(_) => {
         println!("{} {}", style("●").red(), style("stale socket").dim());
      },
   }

   Ok(())
}
