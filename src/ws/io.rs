use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use num_bigint::BigInt;
use num_traits::Zero;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum InputError {
    #[error("end of input")]
    Exhausted,
    #[error("expected number, got {0:?}")]
    Malformed(String),
    #[error("pending input was cancelled")]
    Cancelled,
}

/// Supplies batches of input text on demand. An empty batch means the input has ended.
pub trait InputSource {
    fn more(&mut self) -> LocalBoxFuture<'_, Result<String, InputError>>;
}

/// Hands over a fixed text once, then reports end of input
#[derive(Debug, Default)]
pub struct StaticInput {
    value: Option<String>,
}

impl StaticInput {
    pub fn new(value: &str) -> StaticInput {
        StaticInput {
            value: Some(value.to_string()),
        }
    }
}

impl InputSource for StaticInput {
    fn more(&mut self) -> LocalBoxFuture<'_, Result<String, InputError>> {
        future::ready(Ok(self.value.take().unwrap_or_default())).boxed_local()
    }
}

/// Pulls each batch from a blocking closure, e.g. a line of stdin
pub struct FnInput<F>(pub F);

impl<F> InputSource for FnInput<F>
where
    F: FnMut() -> String,
{
    fn more(&mut self) -> LocalBoxFuture<'_, Result<String, InputError>> {
        future::ready(Ok((self.0)())).boxed_local()
    }
}

#[derive(Debug, Default)]
struct Feed {
    pending: String,
    waiter: Option<oneshot::Sender<String>>,
    closed: bool,
}

/// Input fed from the outside while the machine runs. A read with nothing buffered parks a
/// single waiter which the next `feed` satisfies directly.
#[derive(Debug, Default)]
pub struct FeedInput {
    shared: Rc<RefCell<Feed>>,
}

/// The feeding half of a [`FeedInput`]
#[derive(Debug, Clone)]
pub struct InputFeeder {
    shared: Rc<RefCell<Feed>>,
}

impl FeedInput {
    pub fn new() -> FeedInput {
        FeedInput::default()
    }

    pub fn feeder(&self) -> InputFeeder {
        InputFeeder {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl InputSource for FeedInput {
    fn more(&mut self) -> LocalBoxFuture<'_, Result<String, InputError>> {
        let receiver = {
            let mut feed = self.shared.borrow_mut();
            if !feed.pending.is_empty() {
                let batch = std::mem::take(&mut feed.pending);
                return future::ready(Ok(batch)).boxed_local();
            }
            if feed.closed {
                return future::ready(Ok(String::new())).boxed_local();
            }
            let (sender, receiver) = oneshot::channel();
            feed.waiter = Some(sender);
            receiver
        };

        async move { receiver.await.map_err(|_| InputError::Cancelled) }.boxed_local()
    }
}

impl InputFeeder {
    /// Satisfies a parked read immediately, otherwise buffers the text for the next one
    pub fn feed(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut feed = self.shared.borrow_mut();
        if let Some(waiter) = feed.waiter.take() {
            if let Err(text) = waiter.send(text.to_string()) {
                feed.pending.push_str(&text);
            }
        } else {
            feed.pending.push_str(text);
        }
    }

    /// Ends the input: a parked read and every later read sees end of input
    pub fn close(&self) {
        let mut feed = self.shared.borrow_mut();
        feed.closed = true;
        if let Some(waiter) = feed.waiter.take() {
            let _ = waiter.send(String::new());
        }
    }

    /// Drops the parked read (it fails with [`InputError::Cancelled`]) and any buffered text
    pub fn cancel(&self) {
        let mut feed = self.shared.borrow_mut();
        feed.waiter = None;
        feed.pending.clear();
        feed.closed = false;
    }

    pub fn is_waiting(&self) -> bool {
        self.shared
            .borrow()
            .waiter
            .as_ref()
            .map_or(false, |waiter| !waiter.is_canceled())
    }
}

fn is_delimiter(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\n'
}

/// Character and number reads over a shared text buffer, refilled from an [`InputSource`]
#[derive(Debug)]
pub struct InputPort<S> {
    source: S,
    buffer: VecDeque<char>,
}

impl<S: InputSource> InputPort<S> {
    pub fn new(source: S) -> InputPort<S> {
        InputPort {
            source,
            buffer: VecDeque::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Discards everything buffered but not yet read
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    async fn refill(&mut self) -> Result<(), InputError> {
        let batch = self.source.more().await?;
        if batch.is_empty() {
            return Err(InputError::Exhausted);
        }
        self.buffer.extend(batch.chars());

        Ok(())
    }

    pub async fn read_char(&mut self) -> Result<char, InputError> {
        if self.buffer.is_empty() {
            self.refill().await?;
        }

        self.buffer.pop_front().ok_or(InputError::Exhausted)
    }

    /// Reads a decimal number terminated by a space, tab or line feed, consuming the
    /// delimiter. An empty number reads as 0. A non-digit before the delimiter discards the
    /// whole buffer.
    pub async fn read_number(&mut self) -> Result<BigInt, InputError> {
        let mut i = 0;
        loop {
            if self.buffer.len() <= i {
                self.refill().await?;
            }
            let c = self.buffer[i];
            if is_delimiter(c) {
                break;
            }
            if !c.is_ascii_digit() {
                let text = self.buffer.iter().take(i + 1).collect::<String>();
                self.buffer.clear();
                return Err(InputError::Malformed(text));
            }
            i += 1;
        }

        let digits = self.buffer.drain(..=i).take(i).collect::<String>();
        if digits.is_empty() {
            return Ok(BigInt::zero());
        }
        digits
            .parse::<BigInt>()
            .map_err(|_| InputError::Malformed(digits.clone()))
    }
}

/// Synchronous output: single characters and decimal numbers
pub trait OutputSink {
    fn char(&mut self, c: char);
    fn number(&mut self, n: &BigInt);
}

/// Collects all output in memory
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    chunks: Vec<String>,
    last_read: usize,
}

impl BufferOutput {
    pub fn new() -> BufferOutput {
        BufferOutput::default()
    }

    pub fn all(&self) -> String {
        self.chunks.concat()
    }

    /// Output produced since the previous call
    pub fn take_new(&mut self) -> String {
        let start = self.last_read;
        self.last_read = self.chunks.len();
        self.chunks[start..].concat()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.last_read = 0;
    }
}

impl OutputSink for BufferOutput {
    fn char(&mut self, c: char) {
        self.chunks.push(c.to_string());
    }

    fn number(&mut self, n: &BigInt) {
        self.chunks.push(n.to_string());
    }
}

/// Forwards every piece of output to a closure
pub struct CallbackOutput<F>(pub F);

impl<F> OutputSink for CallbackOutput<F>
where
    F: FnMut(&str),
{
    fn char(&mut self, c: char) {
        let mut buf = [0; 4];
        (self.0)(c.encode_utf8(&mut buf));
    }

    fn number(&mut self, n: &BigInt) {
        (self.0)(&n.to_string());
    }
}

/// The port a machine talks to
#[derive(Debug)]
pub struct Io<S, O> {
    pub input: InputPort<S>,
    pub output: O,
}

impl<S: InputSource, O: OutputSink> Io<S, O> {
    pub fn new(source: S, output: O) -> Io<S, O> {
        Io {
            input: InputPort::new(source),
            output,
        }
    }
}
