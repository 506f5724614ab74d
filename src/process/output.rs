// src/process/output.rs

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::broadcast::{Broadcaster, Weighted};

const READ_CHUNK: usize = 4096;

/// A piece of captured process output, as read from the pipe.
///
/// No line splitting; chunk boundaries are wherever the read returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk(Arc<[u8]>);

impl OutputChunk {
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Weighted for OutputChunk {
    fn weight(&self) -> usize {
        self.0.len()
    }
}

/// Copy everything read from `stream` into `sink` until EOF.
///
/// Fire-and-forget: spawns a Tokio task.
pub(crate) fn tee<R>(program: String, stream_name: &'static str, mut stream: R, sink: Broadcaster<OutputChunk>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    trace!(program = %program, stream = stream_name, bytes = n, "captured output");
                    sink.write(OutputChunk::new(&buf[..n]));
                }
                Err(e) => {
                    warn!(program = %program, stream = stream_name, error = %e, "output read failed");
                    break;
                }
            }
        }
        debug!(program = %program, stream = stream_name, "output stream closed");
    });
}
