//! Bounded reorder window.
//!
//! Packets are buffered keyed by their microsecond timestamp. The window
//! invariant: after every `update`, newest minus oldest never exceeds the
//! out-of-order tolerance; anything older is evicted to the output in
//! ascending timestamp order as newer packets arrive. Equal timestamps keep
//! their arrival order.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{Result, SieveError};

#[derive(Debug)]
pub struct ReorderWindow {
    tolerance: i64,
    window: BTreeMap<i64, Vec<String>>,
}

impl ReorderWindow {
    pub fn new(tolerance: i64) -> Result<Self> {
        if tolerance <= 0 {
            return Err(SieveError::argument(format!(
                "Reorder window size must be greater than 0, given: {tolerance}"
            )));
        }
        Ok(ReorderWindow {
            tolerance,
            window: BTreeMap::new(),
        })
    }

    /// Insert one packet and evict everything the newly widened window can
    /// no longer tolerate.
    pub fn update(
        &mut self,
        timestamp: i64,
        text: String,
        out: &mut dyn Write,
    ) -> std::io::Result<()> {
        self.window.entry(timestamp).or_default().push(text);

        let newest = match self.window.keys().next_back() {
            Some(&ts) => ts,
            None => return Ok(()),
        };
        while let Some(&oldest) = self.window.keys().next() {
            if newest - oldest <= self.tolerance {
                break;
            }
            if let Some(texts) = self.window.remove(&oldest) {
                for text in texts {
                    writeln!(out, "{text}")?;
                }
            }
        }
        Ok(())
    }

    /// Drain everything that is still buffered, in ascending order.
    pub fn flush(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        for (_, texts) in std::mem::take(&mut self.window) {
            for text in texts {
                writeln!(out, "{text}")?;
            }
        }
        Ok(())
    }

    /// Newest minus oldest buffered timestamp; zero when empty.
    #[allow(dead_code)] // exercised by the window-span tests
    pub fn span(&self) -> i64 {
        match (self.window.keys().next(), self.window.keys().next_back()) {
            (Some(&oldest), Some(&newest)) => newest - oldest,
            _ => 0,
        }
    }

    #[allow(dead_code)] // exercised by the window-span tests
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
