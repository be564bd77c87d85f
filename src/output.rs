//! Layered output buffering for served responses.
//!
//! Response bodies are written into a stack of buffers instead of straight to
//! the client. A fatal failure can then throw away everything produced so far
//! and start over with a clean buffer.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Transformation applied to a buffer's contents when it is flushed.
pub type OutputFilter = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Output-buffering control used by the reporter.
pub trait OutputBuffer: Send + Sync {
    /// Contents of every open buffer, outermost first.
    fn snapshot(&self) -> Vec<u8>;

    /// Discard every open buffer and its contents. Must not fail when nothing
    /// is buffered.
    fn drain(&self);

    /// Open a new innermost buffer.
    fn open(&self, filter: Option<OutputFilter>);

    /// Append bytes to the innermost buffer, or to the sink when none is open.
    fn write(&self, bytes: &[u8]);

    /// Close every buffer, innermost first, pushing contents to the sink.
    fn flush(&self) -> io::Result<()>;
}

struct Layer {
    contents: Vec<u8>,
    filter: Option<OutputFilter>,
}

impl Layer {
    fn into_output(self) -> Vec<u8> {
        match self.filter {
            Some(filter) => filter(&self.contents),
            None => self.contents,
        }
    }
}

struct StackState {
    layers: Vec<Layer>,
    sink: Box<dyn Write + Send>,
}

/// Stack of output buffers in front of a writer.
///
/// Cloning yields another handle to the same stack, so application code and
/// the reporter can share it.
#[derive(Clone)]
pub struct BufferStack {
    state: Arc<Mutex<StackState>>,
}

impl fmt::Debug for BufferStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferStack")
            .field("depth", &self.depth())
            .finish()
    }
}

impl BufferStack {
    /// Create a stack writing to `sink`, with one buffer already open.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(StackState {
                layers: vec![Layer {
                    contents: Vec::new(),
                    filter: None,
                }],
                sink: Box::new(sink),
            })),
        }
    }

    /// Create a stack writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Number of open buffers.
    pub fn depth(&self) -> usize {
        self.lock().layers.len()
    }

    fn lock(&self) -> MutexGuard<'_, StackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputBuffer for BufferStack {
    fn snapshot(&self) -> Vec<u8> {
        self.lock()
            .layers
            .iter()
            .flat_map(|layer| layer.contents.iter().copied())
            .collect()
    }

    fn drain(&self) {
        self.lock().layers.clear();
    }

    fn open(&self, filter: Option<OutputFilter>) {
        self.lock().layers.push(Layer {
            contents: Vec::new(),
            filter,
        });
    }

    fn write(&self, bytes: &[u8]) {
        let mut state = self.lock();
        match state.layers.last_mut() {
            Some(layer) => layer.contents.extend_from_slice(bytes),
            None => {
                if let Err(e) = state.sink.write_all(bytes) {
                    tracing::warn!(error = %e, "failed to write unbuffered output");
                }
            }
        }
    }

    fn flush(&self) -> io::Result<()> {
        let mut state = self.lock();
        while let Some(layer) = state.layers.pop() {
            let output = layer.into_output();
            match state.layers.last_mut() {
                Some(outer) => outer.contents.extend_from_slice(&output),
                None => state.sink.write_all(&output)?,
            }
        }
        state.sink.flush()
    }
}

impl Write for BufferStack {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        <Self as OutputBuffer>::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Buffered content is only released by `OutputBuffer::flush`.
        Ok(())
    }
}
