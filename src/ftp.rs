//! Remote server surface: the CTD source and the KKYY destination.
//!
//! The orchestrator only sees the connector/session traits; [`FtpSource`]
//! and [`FtpDestination`] implement them over plain FTP.

use crate::error::Result;
use std::io::Cursor;
use suppaftp::types::{FileType, FormatControl};
use suppaftp::FtpStream;
use tracing::{debug, warn};

/// Opens sessions on the server CTD files are collected from.
pub trait SourceConnector {
    type Session: SourceSession;

    fn connect(&self) -> Result<Self::Session>;
}

pub trait SourceSession {
    /// File names in the working directory, in server order.
    fn list(&mut self) -> Result<Vec<String>>;

    /// Retrieve a text file as owned lines.
    fn retrieve_lines(&mut self, name: &str) -> Result<Vec<String>>;

    fn disconnect(self) -> Result<()>;
}

/// Opens authenticated sessions on the server KKYY messages are sent to.
pub trait DestinationConnector {
    type Session: DestinationSession;

    fn connect(&self) -> Result<Self::Session>;
}

pub trait DestinationSession {
    fn store(&mut self, name: &str, content: &str) -> Result<()>;

    fn disconnect(self) -> Result<()>;
}

/// Connection details for one FTP server.
#[derive(Debug, Clone)]
pub struct FtpEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Directory to change into after login
    pub directory: Option<String>,
}

impl FtpEndpoint {
    fn open(&self) -> Result<FtpStream> {
        debug!("Connecting to FTP server: {}:{}", self.host, self.port);
        let mut stream = FtpStream::connect(format!("{}:{}", self.host, self.port))?;

        debug!("Logging in as: {}", self.username);
        stream.login(self.username.as_str(), self.password.as_str())?;

        if let Some(directory) = self.directory.as_deref().filter(|d| !d.is_empty()) {
            debug!("Changing directory to {}", directory);
            stream.cwd(directory)?;
        }

        Ok(stream)
    }
}

#[derive(Debug, Clone)]
pub struct FtpSource {
    endpoint: FtpEndpoint,
}

impl FtpSource {
    pub fn new(endpoint: FtpEndpoint) -> Self {
        Self { endpoint }
    }
}

impl SourceConnector for FtpSource {
    type Session = FtpSession;

    fn connect(&self) -> Result<FtpSession> {
        Ok(FtpSession {
            stream: self.endpoint.open()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FtpDestination {
    endpoint: FtpEndpoint,
}

impl FtpDestination {
    pub fn new(endpoint: FtpEndpoint) -> Self {
        Self { endpoint }
    }
}

impl DestinationConnector for FtpDestination {
    type Session = FtpSession;

    fn connect(&self) -> Result<FtpSession> {
        let mut stream = self.endpoint.open()?;
        stream.transfer_type(FileType::Ascii(FormatControl::Default))?;
        Ok(FtpSession { stream })
    }
}

/// A logged-in FTP control connection.
pub struct FtpSession {
    stream: FtpStream,
}

impl FtpSession {
    fn quit(mut self) -> Result<()> {
        if let Err(e) = self.stream.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}

impl SourceSession for FtpSession {
    fn list(&mut self) -> Result<Vec<String>> {
        let names = self.stream.nlst(None)?;
        for name in &names {
            debug!(" {}", name);
        }
        Ok(names)
    }

    fn retrieve_lines(&mut self, name: &str) -> Result<Vec<String>> {
        let buffer = self.stream.retr_as_buffer(name)?;
        let text = String::from_utf8_lossy(buffer.get_ref());
        Ok(meaningful_lines(&text))
    }

    fn disconnect(self) -> Result<()> {
        self.quit()
    }
}

impl DestinationSession for FtpSession {
    fn store(&mut self, name: &str, content: &str) -> Result<()> {
        let mut reader = Cursor::new(content.as_bytes());
        let bytes = self.stream.put_file(name, &mut reader)?;
        debug!("Stored {} ({} bytes)", name, bytes);
        Ok(())
    }

    fn disconnect(self) -> Result<()> {
        self.quit()
    }
}

/// Split retrieved text into lines, dropping blank and single-character
/// lines.
fn meaningful_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.trim().len() > 1)
        .map(String::from)
        .collect()
}
