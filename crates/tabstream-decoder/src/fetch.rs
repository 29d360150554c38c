use reqwest::{Client, Response};
use tracing::debug;

use crate::error::DecodeError;

/// Issue the single GET for `url` and return the response once its status
/// says the body is the requested payload.
///
/// Non-2xx responses are setup failures: their body is an error page, not
/// the requested table.
pub(crate) async fn open(client: &Client, url: &str) -> Result<Response, DecodeError> {
    let response = client.get(url).send().await.map_err(DecodeError::Fetch)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DecodeError::HttpStatus {
            status: status.as_u16(),
        });
    }

    debug!(url, %status, content_length = ?response.content_length(), "response body opened");
    Ok(response)
}
