//! Newline-delimited JSON-RPC over a reader/writer pair.
//!
//! Used for the single-client stdio mode: one message per line on stdin,
//! one per line on stdout. End of input closes the transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CloseHandler, ErrorHandler, MessageHandler, Result, Transport, TransportError};
use crate::mcp::jsonrpc::JsonRpcMessage;

#[derive(Default)]
struct State {
    started: bool,
    closed: bool,
    on_message: Option<MessageHandler>,
    on_close: Option<CloseHandler>,
    on_error: Option<ErrorHandler>,
}

/// State shared with the reader task.
#[derive(Default)]
struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn is_open(&self) -> bool {
        let state = self.state.lock();
        state.started && !state.closed
    }

    fn deliver(&self, message: JsonRpcMessage) {
        let handler = self.state.lock().on_message.clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    fn report(&self, error: &TransportError) {
        let handler = self.state.lock().on_error.clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    fn close(&self) -> bool {
        let (on_close, on_message) = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            (state.on_close.take(), state.on_message.take())
        };
        drop(on_message);

        info!("Stdio transport closed");
        if let Some(handler) = on_close {
            handler();
        }
        true
    }
}

/// Transport over any async byte stream pair.
pub struct StdioTransport<R, W> {
    reader: Mutex<Option<R>>,
    writer: tokio::sync::Mutex<W>,
    shared: Arc<Shared>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl StdioTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Transport bound to the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            writer: tokio::sync::Mutex::new(writer),
            shared: Arc::new(Shared::default()),
            read_task: Mutex::new(None),
        }
    }
}

async fn read_loop<R>(reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Input stream ended");
                break;
            }
            Ok(_) => {
                // Raw bytes: a line that is not UTF-8 is a bad message, not a broken stream.
                let line = buf.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                match JsonRpcMessage::from_slice(line) {
                    Ok(message) => shared.deliver(message),
                    Err(e) => {
                        warn!("Ignoring invalid stdin message: {}", e);
                        shared.report(&TransportError::InvalidMessage(e));
                    }
                }
            }
            Err(e) => {
                warn!("Failed to read from input stream: {}", e);
                shared.report(&TransportError::Io(e));
                break;
            }
        }
    }
    shared.close();
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(TransportError::NotConnected);
            }
            if state.started {
                return Ok(());
            }
            state.started = true;
        }

        let Some(reader) = self.reader.lock().take() else {
            return Err(TransportError::NotConnected);
        };
        let task = tokio::spawn(read_loop(reader, self.shared.clone()));
        *self.read_task.lock() = Some(task);

        info!("Stdio transport started");
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<()> {
        if !self.shared.is_open() {
            return Err(TransportError::NotConnected);
        }

        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(&line).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);

        if let Err(e) = written {
            warn!("Failed to write to output stream: {}", e);
            let error = TransportError::Io(e);
            self.shared.report(&error);
            self.shared.close();
            return Err(error);
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shared.close();
        if let Some(task) = self.read_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        self.shared.state.lock().on_message = Some(handler);
    }

    fn set_close_handler(&self, handler: CloseHandler) {
        self.shared.state.lock().on_close = Some(handler);
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        self.shared.state.lock().on_error = Some(handler);
    }
}
