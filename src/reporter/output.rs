use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::config::{OutputConfig, OutputKind};

/// In-memory sink shared with whoever reads the rendered lines back.
pub type LineBuffer = Arc<Mutex<Vec<String>>>;

/// Destination of rendered snapshots, one JSON document per line.
///
/// Enum dispatch keeps the reporter loop free of boxed writers.
pub enum Output {
    Stdout,
    File(BufWriter<File>),
    Buffer(LineBuffer),
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Output {
    /// Opens the destination named by `cfg`. Files are created if missing and
    /// appended to otherwise.
    pub fn from_config(cfg: &OutputConfig) -> Result<Self> {
        match cfg.kind {
            OutputKind::Stdout => Ok(Self::Stdout),
            OutputKind::File => {
                let path = cfg
                    .path
                    .as_ref()
                    .context("output.path is required when output.kind is file")?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening output file {}", path.display()))?;
                Ok(Self::File(BufWriter::new(file)))
            }
        }
    }

    /// Returns the output name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::File(_) => "file",
            Self::Buffer(_) => "buffer",
        }
    }

    /// Writes one rendered document followed by a newline.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{line}").context("writing to stdout")?;
                out.flush().context("flushing stdout")?;
            }
            Self::File(w) => {
                writeln!(w, "{line}").context("writing to output file")?;
                w.flush().context("flushing output file")?;
            }
            Self::Buffer(lines) => lines.lock().push(line.to_owned()),
        }

        Ok(())
    }
}
