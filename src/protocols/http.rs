//! HTTP transport built on the blocking `reqwest` client

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::TransferError;
use crate::protocols::{HttpClient, HttpReply, UploadForm, CONNECT_TIMEOUT};

/// Header carrying the API key
pub const AUTH_HEADER: &str = "x-authorization";

/// Content type of the uploaded file part
const FILE_CONTENT_TYPE: &str = "text/csv";

/// Timeout for status and delete calls
///
/// Uploads and archive downloads are not limited, since their duration
/// depends on file size and link speed; only connecting is.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// [`HttpClient`] backed by `reqwest::blocking::Client`
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, TransferError> {
        Ok(ReqwestClient {
            client: Self::builder().build()?,
        })
    }

    fn builder() -> reqwest::blocking::ClientBuilder {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
    }

    fn send(request: RequestBuilder) -> Result<HttpReply, TransferError> {
        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(HttpReply { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn set_api_key(&mut self, api_key: &str) -> Result<(), TransferError> {
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|e| TransferError::Connection(format!("Invalid API key: {}", e)))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, value);
        self.client = Self::builder().default_headers(headers).build()?;
        Ok(())
    }

    fn post_multipart(&self, url: &str, form: &UploadForm) -> Result<HttpReply, TransferError> {
        let file = Part::file(&form.file)?.mime_str(FILE_CONTENT_TYPE)?;
        let mut multipart = Form::new().text("export_type", form.export_type.clone());
        if let Some(email) = &form.notify_email {
            multipart = multipart.text("notify_email", email.clone());
        }
        let multipart = multipart.part("file", file);

        Self::send(self.client.post(url).multipart(multipart))
    }

    fn get(&self, url: &str) -> Result<HttpReply, TransferError> {
        Self::send(self.client.get(url).timeout(REQUEST_TIMEOUT))
    }

    fn get_file(&self, url: &str, dest: &Path) -> Result<HttpReply, TransferError> {
        let mut response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes()?.to_vec();
            return Ok(HttpReply { status, body });
        }

        let mut file = File::create(dest)?;
        let copied = response
            .copy_to(&mut file)
            .map_err(TransferError::from)
            .and_then(|_| file.flush().map_err(TransferError::from));
        if let Err(e) = copied {
            drop(file);
            let _ = fs::remove_file(dest);
            return Err(e);
        }

        Ok(HttpReply {
            status,
            body: Vec::new(),
        })
    }

    fn delete(&self, url: &str) -> Result<HttpReply, TransferError> {
        Self::send(self.client.delete(url).timeout(REQUEST_TIMEOUT))
    }
}
