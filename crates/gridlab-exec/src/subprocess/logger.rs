use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, trace, warn};

/// Level at which a child's output lines are re-emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
}

/// How child output is forwarded into the log.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    /// Longer lines are cut at a char boundary.
    pub max_line_length: usize,
    pub stdout: OutputLevel,
    pub stderr: OutputLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout: OutputLevel::Debug,
            stderr: OutputLevel::Info,
        }
    }
}

fn truncate(mut line: String, max: usize) -> String {
    if line.len() > max {
        let mut cut = max;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
        line.push_str("...");
    }
    line
}

/// Read `reader` line by line until EOF and log every line under `step`.
pub(crate) async fn forward_lines<R>(reader: Option<R>, step: &str, stream: &str, level: OutputLevel, max: usize)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else { return };
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => truncate(line, max),
            Ok(None) => break,
            Err(e) => {
                debug!(step, stream, error = %e, "stopped reading child output");
                break;
            }
        };
        match level {
            OutputLevel::Off => {}
            OutputLevel::Trace => trace!(step, stream, "{line}"),
            OutputLevel::Debug => debug!(step, stream, "{line}"),
            OutputLevel::Info => info!(step, stream, "{line}"),
            OutputLevel::Warn => warn!(step, stream, "{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short".into(), 10), "short");
        assert_eq!(truncate("abcdef".into(), 3), "abc...");
        assert_eq!(truncate("aé".into(), 2), "a...");
    }
}
