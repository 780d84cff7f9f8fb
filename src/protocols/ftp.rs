//! Plain FTP transport built on `suppaftp`
//!
//! `FtpOpener` produces [`FtpSession`]s used for listing, fetching and
//! deleting results. `FtpUploader` stores files on its own short-lived
//! connection and reads the closing reply off the control socket itself,
//! because `suppaftp` checks that reply but does not return its text.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

use crate::error::TransferError;
use crate::protocols::{
    FileTransferClient, RemoteSession, SessionOpener, SessionOptions, TransferReply,
};

/// Connects to the first reachable address of `host:port`
fn connect(host: &str, port: u16, timeout: Duration) -> Result<FtpStream, FtpError> {
    let addrs: Vec<std::net::SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(FtpError::ConnectionError)?
        .collect();

    if addrs.is_empty() {
        return Err(FtpError::ConnectionError(io::Error::new(
            io::ErrorKind::NotFound,
            "No addresses found",
        )));
    }

    let mut last_error = None;
    for addr in addrs {
        match FtpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        FtpError::ConnectionError(io::Error::new(
            io::ErrorKind::NotFound,
            "No addresses available",
        ))
    }))
}

/// Connects, logs in and switches to binary mode
fn open_stream(options: &SessionOptions) -> Result<FtpStream, FtpError> {
    let mut stream = connect(&options.host, options.port, options.timeout)?;
    if let Err(e) = stream
        .login(options.username.as_str(), options.password())
        .and_then(|_| stream.transfer_type(FileType::Binary))
    {
        let _ = stream.quit();
        return Err(e);
    }
    Ok(stream)
}

/// Last path component of a listing entry; some servers return full paths
fn entry_name(entry: &str) -> &str {
    entry.trim_end_matches('/').rsplit('/').next().unwrap_or(entry)
}

/// Opens [`FtpSession`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpOpener;

impl SessionOpener for FtpOpener {
    fn open(&self, options: &SessionOptions) -> Result<Box<dyn RemoteSession>, TransferError> {
        let stream = open_stream(options).map_err(reject)?;
        Ok(Box::new(FtpSession {
            stream: Some(stream),
        }))
    }
}

/// Logged-in FTP control connection
pub struct FtpSession {
    stream: Option<FtpStream>,
}

impl FtpSession {
    fn stream(&mut self) -> Result<&mut FtpStream, TransferError> {
        self.stream
            .as_mut()
            .ok_or_else(|| TransferError::Connection("FTP session is closed".to_string()))
    }
}

impl RemoteSession for FtpSession {
    fn list_directory(&mut self, path: &str) -> Result<Vec<String>, TransferError> {
        let entries = self.stream()?.nlst(Some(path))?;
        Ok(entries
            .iter()
            .map(|entry| entry_name(entry).to_string())
            .collect())
    }

    fn get_file(&mut self, remote: &str, local: &Path, remove: bool) -> Result<(), TransferError> {
        let stream = self.stream()?;
        let mut file = File::create(local)?;
        let fetched = stream
            .retr(remote, |reader| {
                io::copy(reader, &mut file).map_err(FtpError::ConnectionError)
            })
            .map_err(TransferError::from)
            .and_then(|_| file.flush().map_err(TransferError::from));

        if let Err(e) = fetched {
            drop(file);
            let _ = fs::remove_file(local);
            return Err(e);
        }

        if remove {
            stream.rm(remote)?;
        }
        Ok(())
    }

    fn remove_file(&mut self, remote: &str) -> Result<(), TransferError> {
        self.stream()?.rm(remote)?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.quit();
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stores files on a dedicated connection and returns the closing reply
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpUploader;

fn describe(status: Status, body: &[u8]) -> TransferReply {
    TransferReply {
        code: status.code(),
        description: String::from_utf8_lossy(body).trim().to_string(),
    }
}

/// Keeps the server's text for replies that refuse a command
fn reject(err: FtpError) -> TransferError {
    match err {
        FtpError::UnexpectedResponse(response) => {
            let reply = describe(response.status, &response.body);
            TransferError::Rejected {
                code: reply.code,
                description: reply.description,
            }
        }
        other => other.into(),
    }
}

/// Reads one CRLF-terminated line, byte by byte so nothing past it is consumed
fn read_line<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
}

/// Reads a complete reply, following `226-...` continuation lines
fn read_reply<R: Read>(reader: &mut R) -> io::Result<TransferReply> {
    let first = read_line(reader)?;
    let code = first
        .get(..3)
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Malformed reply: {}", first))
        })?;

    let mut text = first.clone();
    if first.as_bytes().get(3) == Some(&b'-') {
        let last_prefix = format!("{} ", &first[..3]);
        loop {
            let line = read_line(reader)?;
            text.push('\n');
            text.push_str(&line);
            if line.starts_with(&last_prefix) {
                break;
            }
        }
    }

    Ok(TransferReply {
        code,
        description: text.trim().to_string(),
    })
}

/// STOR `source` as `remote_path` and read the reply that closes the transfer
fn store(
    stream: &mut FtpStream,
    remote_path: &str,
    source: &mut File,
    timeout: Duration,
) -> Result<TransferReply, TransferError> {
    let mut data = stream.put_with_stream(remote_path).map_err(reject)?;
    io::copy(source, &mut data)?;
    drop(data);

    let mut control = stream.get_ref();
    control.set_read_timeout(Some(timeout))?;
    let reply = read_reply(&mut control)?;
    control.set_read_timeout(None)?;

    if reply.code < 400 {
        Ok(reply)
    } else {
        Err(TransferError::Rejected {
            code: reply.code,
            description: reply.description,
        })
    }
}

impl FileTransferClient for FtpUploader {
    fn upload_file(
        &mut self,
        options: &SessionOptions,
        remote_path: &str,
        local: &Path,
    ) -> Result<TransferReply, TransferError> {
        let mut source = File::open(local)?;
        let mut stream = open_stream(options).map_err(reject)?;

        let result = store(&mut stream, remote_path, &mut source, options.timeout);
        let _ = stream.quit();
        result
    }
}
