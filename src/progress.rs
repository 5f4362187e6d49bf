//! Single-line progress output for sequential batch commands.
//!
//! Renders `message... OK -- message... OK` segments on one line per item,
//! with a red `ERROR:` prefix when a step fails. Batches are fail-fast: the
//! caller propagates the first failure.

use console::style;
use std::io::Write;

pub struct Progress {
    first: bool,
    ended: bool,
}

impl Progress {
    pub fn new() -> Self {
        Progress {
            first: true,
            ended: true,
        }
    }

    /// Announce a step: `message... `.
    pub fn start(&mut self, message: &str) {
        if !self.ended {
            self.done();
        }
        self.ended = false;
        let sep = if self.first { "" } else { " -- " };
        print!("{sep}{message}... ");
        let _ = std::io::stdout().flush();
        self.first = false;
    }

    /// Confirm the running step with `OK`.
    pub fn done(&mut self) {
        if !self.ended {
            print!("{}", style("OK").green());
            let _ = std::io::stdout().flush();
            self.ended = true;
        }
    }

    /// End the line after the last step of an item.
    pub fn finish(&mut self) {
        self.done();
        println!();
        self.first = true;
    }

    /// Mark the running step as failed; the caller prints the error itself.
    pub fn fail(&mut self) {
        if !self.ended {
            print!("{} ", style("ERROR:").red().bold());
            let _ = std::io::stdout().flush();
            self.ended = true;
        }
        println!();
        self.first = true;
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_flags_stay_consistent() {
        let mut progress = Progress::new();
        progress.start("step one");
        assert!(!progress.ended);
        progress.start("step two");
        progress.finish();
        assert!(progress.ended);
        assert!(progress.first);
        // fail after finish is harmless
        progress.fail();
        assert!(progress.ended);
    }
}
