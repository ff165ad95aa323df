// ABOUTME: Per-worker output monitor task.
// ABOUTME: Relabels each captured line, then reports the exit code once the stream closes.

use crate::output::Console;
use crate::process::ProcessHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Forward `output` line by line under `instance`, then wait for the exit code
/// and emit the termination line. Never signals the process.
///
/// Lines are buffered whole, so a worker that never writes a newline grows
/// the buffer without bound.
pub fn spawn_monitor<R>(
    instance: String,
    output: R,
    process: Arc<ProcessHandle>,
    console: Console,
    poll_interval: Duration,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        forward_lines(&instance, output, &console).await;

        let code = wait_for_exit(&process, poll_interval).await;
        console.status(&instance, &format!("Terminated (retcode: {code})"));
        tracing::info!(instance = %instance, pid = process.pid(), code, "Worker terminated");
    })
}

async fn forward_lines<R>(instance: &str, output: R, console: &Console)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => console.output(instance, &String::from_utf8_lossy(strip_newline(&buf))),
            Err(e) => {
                console.status(
                    instance,
                    &format!("Error while reading outputs from \"{instance}\": {e}"),
                );
                tracing::warn!(instance = %instance, error = %e, "Output stream failed");
                break;
            }
        }
    }
}

fn strip_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// The exit code is not guaranteed to be observable the instant the stream
/// closes, so poll for it.
pub async fn wait_for_exit(process: &ProcessHandle, poll_interval: Duration) -> i32 {
    loop {
        if let Some(code) = process.exit_code() {
            return code;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use tokio::process::Command;

    fn console(sink: &Arc<BufferSink>) -> Console {
        Console::new(sink.clone(), "sup", ["w_1"])
    }

    /// Yields some bytes, then fails.
    struct FailingReader {
        sent: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "pipe exploded")))
            } else {
                self.sent = true;
                buf.put_slice(b"before failure\n");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[test]
    fn test_strip_newline() {
        assert_eq!(strip_newline(b"abc\n"), b"abc");
        assert_eq!(strip_newline(b"abc\r\n"), b"abc");
        assert_eq!(strip_newline(b"abc"), b"abc");
        assert_eq!(strip_newline(b" padded  \n"), b" padded  ");
    }

    #[tokio::test]
    async fn test_forwards_lines_in_order_then_terminates() {
        let child = Command::new("sh").args(["-c", "exit 7"]).spawn().unwrap();
        let process = Arc::new(ProcessHandle::new(child));
        let sink = Arc::new(BufferSink::new());

        let output: &'static [u8] = b"first\nsecond line\r\nlast without newline";
        spawn_monitor(
            "w_1".to_string(),
            output,
            process,
            console(&sink),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(
            sink.lines(),
            vec![
                "w_1 | first",
                "w_1 | second line",
                "w_1 | last without newline",
                "w_1 > Terminated (retcode: 7)",
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_is_reported_and_monitor_still_finishes() {
        let child = Command::new("true").spawn().unwrap();
        let process = Arc::new(ProcessHandle::new(child));
        let sink = Arc::new(BufferSink::new());

        spawn_monitor(
            "w_1".to_string(),
            FailingReader { sent: false },
            process,
            console(&sink),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        let lines = sink.lines();
        assert_eq!(lines[0], "w_1 | before failure");
        assert!(lines[1].starts_with("w_1 > Error while reading outputs from \"w_1\""));
        assert!(lines[1].contains("pipe exploded"));
        assert_eq!(lines[2], "w_1 > Terminated (retcode: 0)");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced_not_fatal() {
        let child = Command::new("true").spawn().unwrap();
        let process = Arc::new(ProcessHandle::new(child));
        let sink = Arc::new(BufferSink::new());

        let output: &'static [u8] = b"ok\n\xff\xfe\nafter\n";
        spawn_monitor(
            "w_1".to_string(),
            output,
            process,
            console(&sink),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "w_1 | after");
    }
}
