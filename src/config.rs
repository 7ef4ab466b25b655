use std::sync::Arc;

/// Tunables for a [`StreamEngine`](crate::engine::StreamEngine).
///
/// Listener address and backlog are configured externally, by whatever owns
/// the `Listener` collaborator; this crate only knows about the read buffer.
#[derive(Debug, Clone)]
pub struct Config {
    read_buffer_size: usize,
}

const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024;

impl Config {
    /// Create a config with defaults (1 MiB read buffer).
    pub fn new() -> Config {
        Config {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Size, in bytes, of the scratch buffer each `StreamEngine` reads into
    /// on every drain iteration.
    pub fn read_buffer_size(&mut self, value: usize) -> &mut Self {
        self.read_buffer_size = value;
        self
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Create an `Arc`'d config clone to pass to server constructors.
    ///
    /// This is just a convenience method.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
