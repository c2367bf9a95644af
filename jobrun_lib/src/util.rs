use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    sync::mpsc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// reads a child's output stream line by line and forwards each chunk
/// chunks keep their trailing newline and are not required to be utf8
pub async fn read_to_end<A: AsyncRead + Unpin>(
    stream: A,
    kind: Stream,
    chunk_sender: mpsc::UnboundedSender<(Stream, Vec<u8>)>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    loop {
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if chunk_sender.send((kind, buf)).is_err() {
            // receiver gone, nobody is interested in the rest
            break;
        }
    }
    Ok(())
}

/// receives chunks until every sender is dropped
/// chunks are written to `sink` in arrival order and collected per stream
pub async fn receive_all_chunks(
    chunk_receiver: &mut mpsc::UnboundedReceiver<(Stream, Vec<u8>)>,
    mut sink: Option<&mut File>,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some((kind, chunk)) = chunk_receiver.recv().await {
        if let Some(file) = sink.as_mut() {
            file.write_all(&chunk).await?;
        }
        match kind {
            Stream::Stdout => stdout.extend_from_slice(&chunk),
            Stream::Stderr => stderr.extend_from_slice(&chunk),
        }
    }
    if let Some(file) = sink {
        file.flush().await?;
    }
    Ok((stdout, stderr))
}
