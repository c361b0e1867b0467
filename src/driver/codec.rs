//! Driver wire codec
//!
//! Messages are framed with HTTP-style headers followed by a JSON body:
//! ```text
//! Content-Length: <byte-length>\r\n
//! \r\n
//! <JSON body>
//! ```

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Largest body accepted from the driver
const MAX_BODY: usize = 64 * 1024 * 1024;

fn eof_as_crash(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::DriverCrashed
    } else {
        Error::Io(e)
    }
}

/// Read one framed message
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await.map_err(eof_as_crash)?;
        if bytes_read == 0 {
            return Err(Error::DriverCrashed);
        }

        // Blank line ends the header block
        if line == "\r\n" || line == "\n" {
            break;
        }

        let line = line.trim();
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse().map_err(|_| {
                Error::DriverProtocol(format!("Invalid Content-Length: {}", value.trim()))
            })?);
        }
    }

    let len = content_length
        .ok_or_else(|| Error::DriverProtocol("Missing Content-Length header".to_string()))?;
    if len > MAX_BODY {
        return Err(Error::DriverProtocol(format!(
            "Content-Length too large: {} bytes",
            len
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(eof_as_crash)?;

    String::from_utf8(body).map_err(|e| Error::DriverProtocol(format!("Invalid UTF-8: {}", e)))
}

/// Write one framed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    json: &str,
) -> Result<(), Error> {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}
