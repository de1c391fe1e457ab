use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};

/// ffmpeg rewrites its status line with a bare carriage return, so `\r`
/// terminates a line just like `\n`.
const LINE_DELIMITERS: &[u8] = b"\r\n";

/// Split a child's output into lines, reassembling reads that arrive in
/// fragments. Bytes are decoded lossily and empty lines are dropped. The
/// stream ends at EOF or on the first read error.
pub fn output_lines<R>(reader: R) -> impl Stream<Item = String>
where
    R: AsyncRead + Unpin,
{
    FramedRead::new(reader, AnyDelimiterCodec::new(LINE_DELIMITERS.to_vec(), Vec::new()))
        .take_while(|chunk| futures::future::ready(chunk.is_ok()))
        .filter_map(|chunk| async move {
            let bytes = chunk.ok()?;
            if bytes.is_empty() {
                return None;
            }
            Some(String::from_utf8_lossy(&bytes).into_owned())
        })
}
