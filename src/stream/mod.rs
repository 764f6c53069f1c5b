//! Lazy, cancellable chunk streams with guaranteed release.
//!
//! [`ChunkStream`] is the one stream type that flows between backends, steps,
//! and branch predicates. Reading races the caller's cancellation token and an
//! optional idle timeout. Closing is idempotent, drops the underlying stream,
//! and runs an optional close hook exactly once; dropping a stream closes it,
//! so early returns and `?` never leak a backend stream.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::LoopError;
use crate::types::{MessageAssembler, MessageChunk, ModelMessage, Usage};
use crate::util::with_optional_timeout;

type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// A finite, non-restartable sequence of `T` read with [`ChunkStream::recv`].
pub struct ChunkStream<T> {
    source: Source<T>,
    on_close: Option<CloseHook>,
    idle_timeout: Option<Duration>,
    closed: bool,
}

enum Source<T> {
    Boxed(BoxStream<'static, Result<T, LoopError>>),
    Fork(ForkReader<T>),
    Released,
}

impl<T> ChunkStream<T> {
    fn from_source(source: Source<T>) -> Self {
        Self {
            source,
            on_close: None,
            idle_timeout: None,
            closed: false,
        }
    }

    /// Wrap any stream of results.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, LoopError>> + Send + 'static,
    {
        Self::from_source(Source::Boxed(stream.boxed()))
    }

    /// A stream that yields the given items in order.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
    {
        let items: Vec<T> = items.into_iter().collect();
        Self::new(futures::stream::iter(items.into_iter().map(Ok)))
    }

    /// A stream with exactly one item.
    pub fn once(item: T) -> Self
    where
        T: Send + 'static,
    {
        Self::from_iter([item])
    }

    /// A stream with no items.
    pub fn empty() -> Self
    where
        T: Send + 'static,
    {
        Self::from_iter(Vec::new())
    }

    /// A stream fed by an mpsc receiver; ends when every sender is dropped.
    pub fn from_receiver(rx: mpsc::Receiver<Result<T, LoopError>>) -> Self
    where
        T: Send + 'static,
    {
        Self::new(ReceiverStream::new(rx))
    }

    /// A bounded channel whose receiving half is a stream.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<T, LoopError>>, Self)
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::from_receiver(rx))
    }

    /// Run `hook` once, when this stream is closed or dropped.
    pub fn with_close_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Fail a read with [`LoopError::Timeout`] if no item arrives in time.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read the next item.
    ///
    /// Returns `Ok(None)` at end of stream or after [`close`](Self::close).
    /// Returns [`LoopError::Canceled`] promptly once `cancel` fires, even when
    /// the underlying stream is blocked.
    pub async fn recv(&mut self, cancel: &CancellationToken) -> Result<Option<T>, LoopError>
    where
        T: Clone,
    {
        if self.closed {
            return Ok(None);
        }
        let idle = self.idle_timeout;
        let source = &mut self.source;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LoopError::Canceled),
            item = with_optional_timeout(idle, next_from(source, cancel)) => item,
        }
    }

    /// Release the underlying stream. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Source::Fork(reader) = std::mem::replace(&mut self.source, Source::Released) {
            reader.release();
        }
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }

    /// Drain every remaining item, then close.
    pub async fn collect(mut self, cancel: &CancellationToken) -> Result<Vec<T>, LoopError>
    where
        T: Clone,
    {
        let mut items = Vec::new();
        while let Some(item) = self.recv(cancel).await? {
            items.push(item);
        }
        self.close();
        Ok(items)
    }

    /// Split into two readers over the same source.
    ///
    /// Each reader sees every item in order. The source is read lazily, only
    /// as far as the furthest reader has asked, and is closed once both
    /// readers are closed.
    pub fn fork(self) -> (ChunkStream<T>, ChunkStream<T>)
    where
        T: Clone + Send + 'static,
    {
        let shared = Arc::new(ForkShared {
            buffer: Mutex::new(ForkBuffer {
                upstream: Some(self),
                items: Vec::new(),
                end: None,
            }),
            open_readers: AtomicUsize::new(2),
        });
        let first = ForkReader {
            shared: Arc::clone(&shared),
            cursor: 0,
        };
        let second = ForkReader { shared, cursor: 0 };
        (
            Self::from_source(Source::Fork(first)),
            Self::from_source(Source::Fork(second)),
        )
    }

    /// Call `f` on every item as it passes through.
    pub fn inspect<F>(self, f: F) -> ChunkStream<T>
    where
        F: Fn(&T) + Send + 'static,
        T: Clone + Send + 'static,
    {
        let mut inner = self;
        let stream = async_stream::stream! {
            // Cancellation is observed by the outer reader's recv.
            let never = CancellationToken::new();
            loop {
                match inner.recv(&never).await {
                    Ok(Some(item)) => {
                        f(&item);
                        yield Ok(item);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
            inner.close();
        };
        ChunkStream::new(stream)
    }
}

impl ChunkStream<MessageChunk> {
    /// Reassemble the remaining chunks into one message, then close.
    pub async fn into_message(
        mut self,
        cancel: &CancellationToken,
    ) -> Result<(ModelMessage, Option<Usage>), LoopError> {
        let mut assembler = MessageAssembler::new();
        while let Some(chunk) = self.recv(cancel).await? {
            assembler.push(chunk);
        }
        self.close();
        let usage = assembler.usage().cloned();
        Ok((assembler.finish(), usage))
    }
}

impl<T> Drop for ChunkStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for ChunkStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Boxed(_) => "boxed",
            Source::Fork(_) => "fork",
            Source::Released => "released",
        };
        f.debug_struct("ChunkStream")
            .field("source", &kind)
            .field("idle_timeout", &self.idle_timeout)
            .field("closed", &self.closed)
            .finish()
    }
}

async fn next_from<T: Clone>(
    source: &mut Source<T>,
    cancel: &CancellationToken,
) -> Result<Option<T>, LoopError> {
    match source {
        Source::Boxed(stream) => stream.next().await.transpose(),
        Source::Fork(reader) => reader.next(cancel).await,
        Source::Released => Ok(None),
    }
}

struct ForkShared<T> {
    buffer: Mutex<ForkBuffer<T>>,
    open_readers: AtomicUsize,
}

struct ForkBuffer<T> {
    upstream: Option<ChunkStream<T>>,
    items: Vec<T>,
    end: Option<ForkEnd>,
}

enum ForkEnd {
    Done,
    Failed(String),
}

struct ForkReader<T> {
    shared: Arc<ForkShared<T>>,
    cursor: usize,
}

impl<T> ForkReader<T> {
    async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<T>, LoopError>
    where
        T: Clone,
    {
        let mut buffer = self.shared.buffer.lock().await;
        if let Some(item) = buffer.items.get(self.cursor) {
            self.cursor += 1;
            return Ok(Some(item.clone()));
        }
        match &buffer.end {
            Some(ForkEnd::Done) => return Ok(None),
            Some(ForkEnd::Failed(message)) => return Err(LoopError::Stream(message.clone())),
            None => {}
        }
        let Some(upstream) = buffer.upstream.as_mut() else {
            return Ok(None);
        };
        // Boxed: a fork's upstream may itself be a fork reader.
        match Box::pin(upstream.recv(cancel)).await {
            Ok(Some(item)) => {
                buffer.items.push(item.clone());
                self.cursor += 1;
                Ok(Some(item))
            }
            Ok(None) => {
                buffer.end = Some(ForkEnd::Done);
                Ok(None)
            }
            // A canceled read leaves the source intact for the other reader.
            Err(LoopError::Canceled) => Err(LoopError::Canceled),
            Err(e) => {
                buffer.end = Some(ForkEnd::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn release(self) {
        if self.shared.open_readers.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        // Last reader out closes the source. If the buffer is locked, the
        // source closes when the shared state is dropped instead.
        if let Ok(mut buffer) = self.shared.buffer.try_lock() {
            if let Some(mut upstream) = buffer.upstream.take() {
                upstream.close();
            }
        }
    }
}
