//! RESP2 framing shared by the client and the server.
//!
//! Commands travel as arrays of bulk strings. Replies are simple strings,
//! errors, integers, bulk strings (possibly null) and arrays of replies.

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use crate::{Command, Error, Reply, Result};

/// Maximum nesting depth of arrays in a reply.
const MAX_NESTING_DEPTH: usize = 32;

/// Maximum length of a bulk string (512 MB, matching Redis).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Maximum number of elements in an array.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;

pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", command.parts().len()).as_bytes());
    for part in command.parts() {
        write_bulk(part, &mut out);
    }
    out
}

pub fn encode_reply(reply: &Reply, out: &mut Vec<u8>) {
    match reply {
        Reply::Nil => out.extend_from_slice(b"$-1\r\n"),
        Reply::Status(s) => {
            out.push(b'+');
            out.extend_from_slice(single_line(s).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Reply::Integer(i) => out.extend_from_slice(format!(":{}\r\n", i).as_bytes()),
        Reply::Bulk(data) => write_bulk(data, out),
        Reply::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_reply(item, out);
            }
        }
    }
}

pub fn encode_error(message: &str, out: &mut Vec<u8>) {
    out.push(b'-');
    out.extend_from_slice(single_line(message).as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_bulk(data: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Reads one line and strips its `\r\n`. Returns `None` on a clean EOF.
async fn read_line<R: AsyncBufRead + Unpin + Send>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if !line.ends_with(b"\r\n") {
        return Err(Error::Protocol("line not terminated by CRLF".to_string()));
    }
    line.truncate(line.len() - 2);
    Ok(Some(line))
}

async fn expect_line<R: AsyncBufRead + Unpin + Send>(reader: &mut R) -> Result<Vec<u8>> {
    read_line(reader).await?.ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        ))
    })
}

fn parse_len(raw: &[u8]) -> Result<i64> {
    let s = String::from_utf8_lossy(raw);
    s.parse()
        .map_err(|_| Error::Protocol(format!("invalid length {:?}", s)))
}

async fn read_bulk_body<R: AsyncBufRead + Unpin + Send>(reader: &mut R, len: i64) -> Result<Vec<u8>> {
    if len > MAX_BULK_LEN {
        return Err(Error::Protocol(format!("bulk string of {} bytes is too large", len)));
    }
    let mut data = vec![0u8; len as usize + 2];
    reader.read_exact(&mut data).await?;
    if !data.ends_with(b"\r\n") {
        return Err(Error::Protocol("bulk string not terminated by CRLF".to_string()));
    }
    data.truncate(len as usize);
    Ok(data)
}

/// Reads one reply. An error reply becomes [`Error::Store`].
pub async fn read_reply<R: AsyncBufRead + Unpin + Send>(reader: &mut R) -> Result<Reply> {
    read_reply_nested(reader, 0).await
}

fn read_reply_nested<'a, R: AsyncBufRead + Unpin + Send>(
    reader: &'a mut R,
    depth: usize,
) -> BoxFuture<'a, Result<Reply>> {
    async move {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::Protocol("reply nested too deeply".to_string()));
        }
        let line = expect_line(reader).await?;
        let (&kind, rest) = line
            .split_first()
            .ok_or_else(|| Error::Protocol("empty reply line".to_string()))?;
        match kind {
            b'+' => Ok(Reply::Status(String::from_utf8_lossy(rest).into_owned())),
            b'-' => Err(Error::Store(String::from_utf8_lossy(rest).into_owned())),
            b':' => Ok(Reply::Integer(parse_len(rest)?)),
            b'$' => {
                let len = parse_len(rest)?;
                if len < 0 {
                    return Ok(Reply::Nil);
                }
                Ok(Reply::Bulk(read_bulk_body(reader, len).await?))
            }
            b'*' => {
                let len = parse_len(rest)?;
                if len < 0 {
                    return Ok(Reply::Nil);
                }
                if len > MAX_ARRAY_LEN {
                    return Err(Error::Protocol(format!("array of {} elements is too large", len)));
                }
                let mut items = Vec::with_capacity(len.min(1024) as usize);
                for _ in 0..len {
                    items.push(read_reply_nested(reader, depth + 1).await?);
                }
                Ok(Reply::Array(items))
            }
            other => Err(Error::Protocol(format!("unknown reply type byte {:?}", other as char))),
        }
    }
    .boxed()
}

/// Reads one command sent by a client. Accepts both arrays of bulk strings
/// and inline commands. Returns `None` when the client closed the connection.
pub async fn read_command<R: AsyncBufRead + Unpin + Send>(reader: &mut R) -> Result<Option<Command>> {
    loop {
        let Some(line) = read_line(reader).await? else {
            return Ok(None);
        };
        if line.is_empty() {
            continue;
        }
        if line[0] != b'*' {
            let parts = String::from_utf8_lossy(&line)
                .split_whitespace()
                .map(|p| p.as_bytes().to_vec())
                .collect();
            match Command::from_parts(parts) {
                Some(command) => return Ok(Some(command)),
                None => continue,
            }
        }

        let count = parse_len(&line[1..])?;
        if !(0..=MAX_ARRAY_LEN).contains(&count) {
            return Err(Error::Protocol(format!("invalid argument count {}", count)));
        }
        let mut parts = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let header = expect_line(reader).await?;
            match header.split_first() {
                Some((b'$', len)) => {
                    let len = parse_len(len)?;
                    if len < 0 {
                        return Err(Error::Protocol("null bulk string in command".to_string()));
                    }
                    parts.push(read_bulk_body(reader, len).await?);
                }
                _ => return Err(Error::Protocol("expected bulk string in command".to_string())),
            }
        }
        if let Some(command) = Command::from_parts(parts) {
            return Ok(Some(command));
        }
    }
}
