//! Telegram framing over a line-oriented byte stream

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Upper bound of one buffered telegram, DSMR 5 telegrams stay well below
pub const MAX_TELEGRAM_BYTES: usize = 8 * 1024;

/// Reads complete telegrams from a serial line
///
/// A telegram starts at a provider header (`/`) and ends with the first
/// line starting with `!`. Bytes seen before the first header are kept, so
/// a reader opened mid-telegram still yields the tail of that telegram.
/// A block growing past `MAX_TELEGRAM_BYTES` without a `!` line is dropped
/// and framing starts over.
pub struct TelegramReader<R> {
    reader: R,
    read_timeout: Duration,
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> TelegramReader<R> {
    pub fn new(reader: R, read_timeout: Duration) -> Self {
        Self {
            reader,
            read_timeout,
            line: Vec::with_capacity(128),
        }
    }

    /// Wait for the next complete telegram
    ///
    /// Returns `Ok(None)` at end of stream; an unfinished telegram is
    /// discarded. A read timeout only logs and keeps waiting.
    pub async fn next_telegram(&mut self) -> Result<Option<String>> {
        let mut block = String::new();

        loop {
            // read_until appends partial data to `line`, so a timeout loses nothing
            let read = tokio::time::timeout(
                self.read_timeout,
                self.reader.read_until(b'\n', &mut self.line),
            )
            .await;

            let n = match read {
                Err(_) => {
                    debug!(
                        timeout_secs = self.read_timeout.as_secs(),
                        "no telegram data within read timeout"
                    );
                    continue;
                }
                Ok(result) => result?,
            };

            if n == 0 && self.line.is_empty() {
                if !block.is_empty() {
                    debug!(bytes = block.len(), "stream ended inside a telegram");
                }
                return Ok(None);
            }

            let text = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            trace!(line = %text.trim_end(), "telegram line");

            if text.starts_with('/') {
                block.clear();
            }
            if block.len() + text.len() > MAX_TELEGRAM_BYTES {
                warn!(
                    bytes = block.len() + text.len(),
                    limit = MAX_TELEGRAM_BYTES,
                    "no telegram end within size limit, restarting framing"
                );
                block.clear();
                if text.len() > MAX_TELEGRAM_BYTES {
                    continue;
                }
            }
            block.push_str(&text);

            if text.starts_with('!') {
                return Ok(Some(block));
            }
            if n == 0 {
                return Ok(None);
            }
        }
    }
}
