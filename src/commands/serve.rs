use std::{
   path::{Path, PathBuf},
   sync::Arc,
   time::{Duration, Instant},
};

use anyhow::{Context, Result};
use console::style;
use parking_lot::Mutex;
use tokio::{
   net::{UnixListener, UnixStream},
   signal,
   sync::watch,
};

use crate::{
   auth::{Authenticator, StaticTokenAuth},
   config,
   embed::{EmbeddingProvider, HttpEmbeddingProvider},
   ipc::{self, Request, Response, ServerStatus},
   search::{FilterEngine, SuggestEngine, SuggestionKind, VectorEngine},
   store::{GalleryStore, MemoryStore},
};

struct ServerState {
   filter:        FilterEngine,
   vector:        VectorEngine,
   suggest:       SuggestEngine,
   auth:          Arc<dyn Authenticator>,
   store:         Arc<MemoryStore>,
   started:       Instant,
   last_activity: Mutex<Instant>,
}

impl ServerState {
   fn touch(&self) {
      *self.last_activity.lock() = Instant::now();
   }

   fn idle_duration(&self) -> Duration {
      self.last_activity.lock().elapsed()
   }
}

pub async fn execute(data: Option<PathBuf>) -> Result<()> {
   let cfg = config::get();

   let socket_path = config::socket_path();
   if let Some(parent) = socket_path.parent() {
      std::fs::create_dir_all(parent).context("failed to create socket directory")?;
   }

   if socket_path.exists() {
      if try_connect(socket_path).await {
         println!("{}", style("Server already running").yellow());
         return Ok(());
      }
      std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
   }

   let listener = UnixListener::bind(socket_path).context("failed to bind socket")?;

   println!("{}", style("Starting galleryd server...").green().bold());
   println!("Socket: {}", style(socket_path.display()).cyan());

   let data_file = data.or_else(|| cfg.data_file.clone());
   let store = match &data_file {
      Some(path) => {
         let store =
            MemoryStore::load(path).with_context(|| format!("failed to load {}", path.display()))?;
         println!(
            "Data: {} ({} images)",
            style(path.display()).cyan(),
            store.image_count()
         );
         Arc::new(store)
      },
      None => {
         println!("{}", style("No data file configured, starting empty").yellow());
         Arc::new(MemoryStore::new())
      },
   };

   let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
      HttpEmbeddingProvider::from_config(cfg).context("failed to build embedding client")?,
   );
   println!("Embeddings: {}", style(&cfg.embed_endpoint).cyan());

   let store_dyn: Arc<dyn GalleryStore> = Arc::clone(&store) as Arc<dyn GalleryStore>;
   let state = Arc::new(ServerState {
      filter:        FilterEngine::new(Arc::clone(&store_dyn)),
      vector:        VectorEngine::new(Arc::clone(&store_dyn), embedder, cfg),
      suggest:       SuggestEngine::new(store_dyn),
      auth:          Arc::new(StaticTokenAuth::new(&cfg.tokens)),
      store:         Arc::clone(&store),
      started:       Instant::now(),
      last_activity: Mutex::new(Instant::now()),
   });

   let (shutdown_tx, shutdown_rx) = watch::channel(false);

   let idle_state = Arc::clone(&state);
   let idle_shutdown = shutdown_tx.clone();
   let idle_timeout = Duration::from_secs(cfg.idle_timeout_secs);
   let idle_check_interval = Duration::from_secs(cfg.idle_check_interval_secs);
   tokio::spawn(async move {
      loop {
         tokio::time::sleep(idle_check_interval).await;
         if idle_state.idle_duration() > idle_timeout {
            println!("{}", style("Idle timeout reached, shutting down...").yellow());
            let _ = idle_shutdown.send(true);
            break;
         }
      }
   });

   println!("\n{}", style("Server listening").green());
   println!("{}", style("Press Ctrl+C to stop").dim());

   let accept_state = Arc::clone(&state);
   let mut accept_shutdown = shutdown_rx.clone();
   let accept_handle = tokio::spawn(async move {
      loop {
         tokio::select! {
            result = listener.accept() => {
               match result {
                  Ok((stream, _)) => {
                     let client_state = Arc::clone(&accept_state);
                     tokio::spawn(handle_client(stream, client_state));
                  }
                  Err(e) => {
                     tracing::error!("Accept error: {}", e);
                  }
               }
            }
            _ = accept_shutdown.changed() => {
               if *accept_shutdown.borrow() {
                  break;
               }
            }
         }
      }
   });

   tokio::select! {
      _ = signal::ctrl_c() => {
         println!("\n{}", style("Shutting down...").yellow());
         let _ = shutdown_tx.send(true);
      }
      _ = async {
         let mut rx = shutdown_rx.clone();
         loop {
            rx.changed().await.ok();
            if *rx.borrow() {
               break;
            }
         }
      } => {}
   }

   accept_handle.abort();
   let _ = std::fs::remove_file(socket_path);

   println!("{}", style("Server stopped").green());
   Ok(())
}

async fn try_connect(socket_path: &Path) -> bool {
   UnixStream::connect(socket_path).await.is_ok()
}

async fn handle_client(mut stream: UnixStream, state: Arc<ServerState>) {
   state.touch();

   let mut buffer = ipc::SocketBuffer::new();

   loop {
      let request: Request = match buffer.recv(&mut stream).await {
         Ok(req) => req,
         Err(e) => {
            if e.to_string().contains("failed to read length") {
               break;
            }
            tracing::debug!("Client read error: {}", e);
            break;
         },
      };

      state.touch();

      let response = match request {
         Request::Shutdown => {
            let _ = buffer
               .send(&mut stream, &Response::Shutdown { success: true })
               .await;
            std::process::exit(0);
         },
         other => dispatch(&state, other).await,
      };

      if let Err(e) = buffer.send(&mut stream, &response).await {
         tracing::debug!("Client write error: {}", e);
         break;
      }
   }
}

async fn dispatch(state: &ServerState, request: Request) -> Response {
   match request {
      Request::ListImages { token, query } => {
         let principal = match state.auth.resolve(token.as_deref()).await {
            Ok(p) => p,
            Err(e) => return Response::from_error(&e),
         };
         match state.filter.list(principal.as_ref(), &query).await {
            Ok(response) => Response::Images(response),
            Err(e) => Response::from_error(&e),
         }
      },
      Request::GetImage { token, id } => {
         let principal = match state.auth.resolve(token.as_deref()).await {
            Ok(p) => p,
            Err(e) => return Response::from_error(&e),
         };
         match state.filter.get_image(principal.as_ref(), id).await {
            Ok(detail) => Response::Image(Box::new(detail)),
            Err(e) => Response::from_error(&e),
         }
      },
      Request::Search { token, query } => {
         let principal = match state.auth.resolve(token.as_deref()).await {
            Ok(p) => p,
            Err(e) => return Response::from_error(&e),
         };
         match state.filter.search(principal.as_ref(), &query).await {
            Ok(response) => Response::Search(response),
            Err(e) => Response::from_error(&e),
         }
      },
      Request::VectorSearch { token, query } => {
         let principal = match state.auth.resolve(token.as_deref()).await {
            Ok(p) => p,
            Err(e) => return Response::from_error(&e),
         };
         match state.vector.search(principal.as_ref(), &query).await {
            Ok(response) => Response::Vector(response),
            Err(e) => Response::from_error(&e),
         }
      },
      Request::Suggestions { token, q, kind } => {
         // Suggestions never reveal private rows, but the credential is
         // still validated so a bad token fails loudly.
         if let Err(e) = state.auth.resolve(token.as_deref()).await {
            return Response::from_error(&e);
         }
         let kind = match SuggestionKind::parse(kind.as_deref()) {
            Ok(k) => k,
            Err(e) => return Response::from_error(&e),
         };
         match state.suggest.suggest(&q, kind).await {
            Ok(response) => Response::Suggestions(response),
            Err(e) => Response::from_error(&e),
         }
      },
      Request::Health => Response::Health {
         status: ServerStatus {
            images:      state.store.image_count(),
            uptime_secs: state.started.elapsed().as_secs(),
         },
      },
      Request::Shutdown => Response::Shutdown { success: true },
   }
}
