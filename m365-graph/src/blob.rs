//! Chunked upload to Azure Storage block blobs.
//!
//! Intune hands out a SAS URI per content file. The file is PUT in fixed
//! size blocks, then committed with a block list naming every block in
//! order.

use crate::config::RetryConfig;
use crate::error::{GraphError, GraphResult};
use crate::odata::ODataError;
use crate::retry::send_with_retry;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Block id of the `index`-th block: base64 of the big-endian u32.
pub fn block_id(index: u32) -> String {
    STANDARD.encode(index.to_be_bytes())
}

/// Uploads files to SAS URIs.
#[derive(Debug, Clone)]
pub struct BlobUploader {
    http: Client,
    retry: RetryConfig,
    block_size: usize,
}

impl BlobUploader {
    pub fn new(http: Client, retry: RetryConfig, block_size: usize) -> Self {
        Self {
            http,
            retry,
            block_size: block_size.max(1),
        }
    }

    /// Uploads `path` block by block and commits the block list with
    /// `content_md5` (base64 MD5 of the whole file). Returns the number of
    /// blocks.
    pub async fn upload_file(&self, sas_uri: &str, path: &Path, content_md5: &str) -> GraphResult<u32> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = vec![0u8; self.block_size];
        let mut ids = Vec::new();

        loop {
            let n = fill(&mut file, &mut buf).await?;
            if n == 0 {
                break;
            }
            let index = u32::try_from(ids.len())
                .map_err(|_| GraphError::InvalidUri("too many blocks".to_string()))?;
            let id = block_id(index);
            let uri = with_query(sas_uri, &format!("comp=block&blockid={}", urlencoding::encode(&id)));
            self.put(&uri, buf[..n].to_vec(), None).await?;
            debug!(block = index, bytes = n, "uploaded block");
            ids.push(id);
            if n < self.block_size {
                break;
            }
        }

        let uri = with_query(sas_uri, "comp=blocklist");
        self.put(&uri, block_list_xml(&ids).into_bytes(), Some(content_md5))
            .await?;
        info!(blocks = ids.len(), "committed block list");
        Ok(ids.len() as u32)
    }

    async fn put(&self, uri: &str, body: Vec<u8>, content_md5: Option<&str>) -> GraphResult<()> {
        let response = send_with_retry(&self.retry, redact(uri), || {
            let request = self
                .http
                .put(uri)
                .header("x-ms-blob-type", "BlockBlob")
                .body(body.clone());
            match content_md5 {
                Some(md5) => request.header("x-ms-blob-content-md5", md5),
                None => request,
            }
        })
        .await
        .map_err(|e| GraphError::Network(format!("PUT {}: {e}", redact(uri))))?;

        let status = response.status().as_u16();
        if status == 201 {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(GraphError::Status {
            method: "PUT".to_string(),
            uri: redact(uri).to_string(),
            status,
            error: ODataError::parse(status, &text),
            request_body: None,
        })
    }
}

fn block_list_xml(ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

fn with_query(uri: &str, query: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{query}")
}

// The SAS signature is a credential.
fn redact(uri: &str) -> &str {
    uri.split('?').next().unwrap_or(uri)
}

/// Reads until `buf` is full or the file ends.
async fn fill(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
