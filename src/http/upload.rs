//! Resumable chunked uploads.
//!
//! The source is sent in fixed-size chunks to an upload session URL obtained
//! by the caller. Every chunk names its offset; the last one also carries
//! `finalize`. The server reports progress in `X-Goog-Upload-Status` and the
//! upload only counts as done once that reads `final`.

use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::context::CallContext;
use crate::errors::GenaiError;
use crate::http::{loud_wire, request, transport};
use crate::payload::Payload;

/// Largest chunk sent in one request (8 MiB).
pub(crate) const UPLOAD_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

pub(crate) const UPLOAD_COMMAND_HEADER: &str = "x-goog-upload-command";
pub(crate) const UPLOAD_OFFSET_HEADER: &str = "x-goog-upload-offset";
pub(crate) const UPLOAD_STATUS_HEADER: &str = "x-goog-upload-status";

const STATUS_ACTIVE: &str = "active";
const STATUS_FINAL: &str = "final";

/// Reads until `buf` is full or the source ends. Returns the bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Uploads `size` bytes from `reader` to `upload_url`, returning the payload
/// of the last response.
///
/// An empty source still sends one zero-length `upload, finalize` chunk.
pub(crate) async fn upload_chunks<R>(
    http: &reqwest::Client,
    reader: &mut R,
    upload_url: &Url,
    size: u64,
    headers: &HeaderMap,
    chunk_size: u64,
    ctx: &CallContext,
) -> Result<Payload, GenaiError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let request_id = loud_wire::next_request_id();
    loud_wire::log_upload_start(request_id, upload_url.as_str(), size);

    let mut offset: u64 = 0;

    let (status, last) = loop {
        let chunk_len = chunk_size.min(size - offset);
        let command = if offset + chunk_len >= size {
            "upload, finalize"
        } else {
            "upload"
        };

        let requested = usize::try_from(chunk_len)
            .map_err(|_| GenaiError::InvalidInput(format!("chunk of {chunk_len} bytes is too large")))?;
        let mut buf = vec![0u8; requested];
        let read = ctx
            .run(async {
                fill(&mut *reader, &mut buf).await.map_err(|e| {
                    GenaiError::Upload(format!("failed to read source at offset {offset}: {e}"))
                })
            })
            .await?;
        if read != requested {
            return Err(GenaiError::Upload(format!(
                "short read at offset {offset}: requested {requested} bytes, read {read}"
            )));
        }

        let mut chunk_headers = headers.clone();
        chunk_headers.insert(UPLOAD_COMMAND_HEADER, HeaderValue::from_static(command));
        chunk_headers.insert(UPLOAD_OFFSET_HEADER, HeaderValue::from(offset));
        chunk_headers.insert(CONTENT_LENGTH, HeaderValue::from(chunk_len));

        loud_wire::log_upload_chunk(request_id, command, offset, read);
        debug!(offset, bytes = read, command, "Uploading chunk");

        let request = request::assemble(
            http,
            Method::POST,
            upload_url.clone(),
            chunk_headers,
            Some(buf),
        )?;
        let response = transport::execute(http, request, ctx, request_id).await?;
        let status = response
            .headers()
            .get(UPLOAD_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let payload = ctx.run(transport::read_unary(response, request_id)).await?;

        offset += chunk_len;
        if status != STATUS_ACTIVE {
            break (status, payload);
        }
        if offset >= size {
            return Err(GenaiError::Upload(
                "all content has been uploaded, but the upload status is not finalized".to_string(),
            ));
        }
    };

    if status != STATUS_FINAL {
        return Err(GenaiError::Upload(format!(
            "upload status is not finalized (status: '{status}')"
        )));
    }

    if let Some(uri) = last
        .get("file")
        .and_then(|f| f.get("uri"))
        .and_then(|u| u.as_str())
    {
        loud_wire::log_upload_complete(request_id, uri);
    }
    Ok(last)
}
