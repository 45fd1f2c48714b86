use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio::{
   io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
   net::UnixStream,
};

use crate::{
   error::GalleryError,
   search::{ImageListResponse, SearchResponse, SuggestionResponse, VectorSearchResponse},
   types::{ImageDetail, ImageId, ListQuery, SearchQuery, VectorQuery},
};

/// Wire requests, one per exposed endpoint. `token` is the optional bearer
/// credential; its absence means an anonymous request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
   ListImages {
      token: Option<String>,
      query: ListQuery,
   },
   GetImage {
      token: Option<String>,
      id:    ImageId,
   },
   Search {
      token: Option<String>,
      query: SearchQuery,
   },
   VectorSearch {
      token: Option<String>,
      query: VectorQuery,
   },
   Suggestions {
      token: Option<String>,
      q:     String,
      kind:  Option<String>,
   },
   Health,
   Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
   Images(ImageListResponse),
   Image(Box<ImageDetail>),
   Search(SearchResponse),
   Vector(VectorSearchResponse),
   Suggestions(SuggestionResponse),
   Health { status: ServerStatus },
   Shutdown { success: bool },
   Error(ErrorBody),
}

/// Stable error shape carried over the wire; `status` follows HTTP classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
   pub status:    u16,
   pub message:   String,
   pub required:  Option<String>,
   pub retryable: bool,
}

impl Response {
   pub fn from_error(err: &GalleryError) -> Self {
      let required = match err {
         GalleryError::Forbidden { required } => required.clone(),
         _ => None,
      };
      Self::Error(ErrorBody {
         status: err.status(),
         message: err.to_string(),
         required,
         retryable: err.retryable(),
      })
   }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
   pub images:      usize,
   pub uptime_secs: u64,
}

pub struct SocketBuffer {
   buf: SmallVec<[u8; 2048]>,
}

impl Extend<u8> for &mut SocketBuffer {
   fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
      self.buf.extend(iter);
   }
}

impl Default for SocketBuffer {
   fn default() -> Self {
      Self::new()
   }
}

impl SocketBuffer {
   pub fn new() -> Self {
      Self { buf: SmallVec::new() }
   }

   pub async fn send<W, T>(&mut self, writer: &mut W, msg: &T) -> Result<()>
   where
      W: AsyncWrite + Unpin,
      T: Serialize,
   {
      self.buf.clear();
      self.buf.resize(4, 0u8); // length reserved
      _ = postcard::to_extend(msg, &mut *self).context("failed to serialize message")?;
      let payload_len = (self.buf.len() - 4) as u32;
      *self.buf.first_chunk_mut().unwrap() = payload_len.to_le_bytes();
      writer
         .write_all(&self.buf)
         .await
         .context("failed to write message")?;
      writer.flush().await.context("failed to flush")?;
      Ok(())
   }

   pub async fn recv<'de, R, T>(&'de mut self, reader: &mut R) -> Result<T>
   where
      R: AsyncRead + Unpin,
      T: Deserialize<'de>,
   {
      let mut len_buf = [0u8; 4];
      reader
         .read_exact(&mut len_buf)
         .await
         .context("failed to read length")?;
      let len = u32::from_le_bytes(len_buf) as usize;

      if len > 16 * 1024 * 1024 {
         anyhow::bail!("message too large: {} bytes", len);
      }

      self.buf.resize(len, 0u8);
      reader
         .read_exact(self.buf.as_mut_slice())
         .await
         .context("failed to read payload")?;
      postcard::from_bytes(&self.buf).context("failed to deserialize message")
   }
}

/// One-shot client call against the running daemon.
pub async fn request(req: &Request) -> Result<Response> {
   let socket = crate::config::socket_path();
   let mut stream = UnixStream::connect(socket)
      .await
      .with_context(|| format!("failed to connect to {} (is the server running?)", socket.display()))?;
   let mut buffer = SocketBuffer::new();
   buffer.send(&mut stream, req).await?;
   buffer.recv(&mut stream).await
}
