//! In-memory transport doubles shared by the unit tests

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::TransferError;
use crate::protocols::{
    FileTransferClient, HttpClient, HttpReply, RemoteSession, SessionOpener, SessionOptions,
    TransferReply, UploadForm,
};

/// Scripted state of a fake FTP server
#[derive(Debug, Default)]
pub struct FakeRemote {
    /// Replies to successive listings; once drained, `files` is listed
    pub listings: VecDeque<Result<Vec<String>, String>>,
    pub files: Vec<String>,
    pub open_error: Option<String>,
    pub fetch_error: Option<String>,
    pub remove_error: Option<String>,
    /// Pretend the fetch succeeded without writing anything locally
    pub skip_local_write: bool,

    pub opens: usize,
    pub closes: usize,
    pub listed: Vec<String>,
    pub fetched: Vec<(String, PathBuf, bool)>,
    pub removed: Vec<String>,
}

pub type SharedRemote = Arc<Mutex<FakeRemote>>;

pub struct FakeSession {
    remote: SharedRemote,
}

impl RemoteSession for FakeSession {
    fn list_directory(&mut self, path: &str) -> Result<Vec<String>, TransferError> {
        let mut remote = self.remote.lock().unwrap();
        remote.listed.push(path.to_string());
        match remote.listings.pop_front() {
            Some(Ok(names)) => Ok(names),
            Some(Err(msg)) => Err(TransferError::Connection(msg)),
            None => Ok(remote.files.clone()),
        }
    }

    fn get_file(&mut self, remote_path: &str, local: &Path, remove: bool) -> Result<(), TransferError> {
        let mut remote = self.remote.lock().unwrap();
        if let Some(msg) = &remote.fetch_error {
            return Err(TransferError::Connection(msg.clone()));
        }
        remote
            .fetched
            .push((remote_path.to_string(), local.to_path_buf(), remove));
        if !remote.skip_local_write {
            std::fs::write(local, b"PK\x03\x04")?;
        }
        Ok(())
    }

    fn remove_file(&mut self, remote_path: &str) -> Result<(), TransferError> {
        let mut remote = self.remote.lock().unwrap();
        if let Some(msg) = &remote.remove_error {
            return Err(TransferError::Connection(msg.clone()));
        }
        remote.removed.push(remote_path.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.remote.lock().unwrap().closes += 1;
    }
}

pub struct FakeOpener {
    pub remote: SharedRemote,
    /// Options seen by every `open` call
    pub seen: Arc<Mutex<Vec<(String, String, u16, String)>>>,
}

impl FakeOpener {
    pub fn new(remote: SharedRemote) -> Self {
        FakeOpener {
            remote,
            seen: Arc::default(),
        }
    }
}

impl SessionOpener for FakeOpener {
    fn open(&self, options: &SessionOptions) -> Result<Box<dyn RemoteSession>, TransferError> {
        self.seen.lock().unwrap().push((
            options.host.clone(),
            options.username.clone(),
            options.port,
            options.password().to_string(),
        ));
        let mut remote = self.remote.lock().unwrap();
        remote.opens += 1;
        if let Some(msg) = &remote.open_error {
            return Err(TransferError::Connection(msg.clone()));
        }
        Ok(Box::new(FakeSession {
            remote: self.remote.clone(),
        }))
    }
}

/// Upload client answering every upload with a fixed reply
pub struct FakeUploader {
    pub reply: Result<TransferReply, (u32, String)>,
    pub uploads: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl FakeUploader {
    pub fn replying(code: u32, description: &str) -> Self {
        FakeUploader {
            reply: Ok(TransferReply {
                code,
                description: description.to_string(),
            }),
            uploads: Arc::default(),
        }
    }

    pub fn rejecting(code: u32, description: &str) -> Self {
        FakeUploader {
            reply: Err((code, description.to_string())),
            uploads: Arc::default(),
        }
    }
}

impl FileTransferClient for FakeUploader {
    fn upload_file(
        &mut self,
        _options: &SessionOptions,
        remote_path: &str,
        local: &Path,
    ) -> Result<TransferReply, TransferError> {
        self.uploads
            .lock()
            .unwrap()
            .push((remote_path.to_string(), local.to_path_buf()));
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err((code, description)) => Err(TransferError::Rejected {
                code: *code,
                description: description.clone(),
            }),
        }
    }
}

/// One request seen by [`FakeHttp`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpCall {
    Post(String, UploadForm),
    Get(String),
    GetFile(String, PathBuf),
    Delete(String),
}

#[derive(Debug, Default)]
pub struct FakeHttpState {
    pub api_key: Option<String>,
    pub replies: VecDeque<Result<HttpReply, String>>,
    pub calls: Vec<HttpCall>,
}

/// HTTP client answering requests from a queue of scripted replies
#[derive(Clone, Default)]
pub struct FakeHttp {
    pub state: Arc<Mutex<FakeHttpState>>,
}

impl FakeHttp {
    /// Queues a 200 reply with the given body
    pub fn reply(&self, body: &str) {
        self.reply_with(200, body.as_bytes());
    }

    pub fn reply_with(&self, status: u16, body: &[u8]) {
        self.state.lock().unwrap().replies.push_back(Ok(HttpReply {
            status,
            body: body.to_vec(),
        }));
    }

    pub fn fail(&self, msg: &str) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(Err(msg.to_string()));
    }

    pub fn calls(&self) -> Vec<HttpCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn next(&self, call: HttpCall) -> Result<HttpReply, TransferError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(TransferError::Connection(msg)),
            None => Err(TransferError::Connection("no scripted reply".to_string())),
        }
    }
}

impl HttpClient for FakeHttp {
    fn set_api_key(&mut self, api_key: &str) -> Result<(), TransferError> {
        self.state.lock().unwrap().api_key = Some(api_key.to_string());
        Ok(())
    }

    fn post_multipart(&self, url: &str, form: &UploadForm) -> Result<HttpReply, TransferError> {
        self.next(HttpCall::Post(url.to_string(), form.clone()))
    }

    fn get(&self, url: &str) -> Result<HttpReply, TransferError> {
        self.next(HttpCall::Get(url.to_string()))
    }

    fn get_file(&self, url: &str, dest: &Path) -> Result<HttpReply, TransferError> {
        let reply = self.next(HttpCall::GetFile(url.to_string(), dest.to_path_buf()))?;
        if !reply.is_success() {
            return Ok(reply);
        }
        std::fs::write(dest, &reply.body)?;
        Ok(HttpReply {
            status: reply.status,
            body: Vec::new(),
        })
    }

    fn delete(&self, url: &str) -> Result<HttpReply, TransferError> {
        self.next(HttpCall::Delete(url.to_string()))
    }
}

/// Bytes served for every successful RETR by [`ScriptedFtp`]
pub const SCRIPTED_ARCHIVE: &[u8] = b"PK\x03\x04scripted";

/// Replies a [`ScriptedFtp`] server gives to transfer commands
#[derive(Debug, Clone)]
pub struct FtpScript {
    /// Reply to STOR; anything but a 1xx refuses the upload
    pub stor_opening: &'static str,
    /// Reply sent once the upload's data connection is closed
    pub stor_closing: &'static str,
    /// Reply to RETR; a 1xx serves [`SCRIPTED_ARCHIVE`]
    pub retr_opening: &'static str,
}

impl Default for FtpScript {
    fn default() -> Self {
        FtpScript {
            stor_opening: "150 Ok to send data",
            stor_closing: "226 Transfer complete; source_x.csv",
            retr_opening: "550 No such file",
        }
    }
}

/// Plain FTP server on 127.0.0.1 that answers a fixed script
///
/// Control connections are served one at a time, in passive mode only.
pub struct ScriptedFtp {
    pub port: u16,
    stored: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl ScriptedFtp {
    pub fn start(script: FtpScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stored = Arc::new(Mutex::new(Vec::new()));
        let uploads = Arc::clone(&stored);

        thread::spawn(move || {
            for control in listener.incoming() {
                match control {
                    Ok(control) => {
                        let _ = serve_ftp(control, &script, &uploads);
                    }
                    Err(_) => break,
                }
            }
        });

        ScriptedFtp { port, stored }
    }

    /// Path and content of every completed STOR
    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.stored.lock().unwrap().clone()
    }
}

fn reply(control: &mut TcpStream, line: &str) -> io::Result<()> {
    control.write_all(format!("{}\r\n", line).as_bytes())
}

fn serve_ftp(
    mut control: TcpStream,
    script: &FtpScript,
    stored: &Mutex<Vec<(String, Vec<u8>)>>,
) -> io::Result<()> {
    let mut commands = BufReader::new(control.try_clone()?);
    let mut passive: Option<TcpListener> = None;
    reply(&mut control, "220 Scripted server ready")?;

    loop {
        let mut line = String::new();
        if commands.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        let (verb, arg) = line.split_once(' ').unwrap_or((line, ""));

        match verb.to_ascii_uppercase().as_str() {
            "USER" => reply(&mut control, "331 Password required")?,
            "PASS" => reply(&mut control, "230 Logged in")?,
            "TYPE" => reply(&mut control, "200 Type set")?,
            "DELE" => reply(&mut control, "250 Deleted")?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0")?;
                let port = listener.local_addr()?.port();
                reply(
                    &mut control,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port / 256,
                        port % 256
                    ),
                )?;
                passive = Some(listener);
            }
            "STOR" => {
                reply(&mut control, script.stor_opening)?;
                if script.stor_opening.starts_with('1') {
                    if let Some(listener) = passive.take() {
                        let (mut data, _) = listener.accept()?;
                        let mut body = Vec::new();
                        data.read_to_end(&mut body)?;
                        stored.lock().unwrap().push((arg.to_string(), body));
                    }
                    reply(&mut control, script.stor_closing)?;
                }
            }
            "RETR" => {
                reply(&mut control, script.retr_opening)?;
                if script.retr_opening.starts_with('1') {
                    if let Some(listener) = passive.take() {
                        let (mut data, _) = listener.accept()?;
                        data.write_all(SCRIPTED_ARCHIVE)?;
                    }
                    reply(&mut control, "226 Transfer complete")?;
                }
            }
            "QUIT" => {
                reply(&mut control, "221 Goodbye")?;
                return Ok(());
            }
            _ => reply(&mut control, "502 Command not implemented")?,
        }
    }
}
