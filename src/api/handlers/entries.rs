use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::key_store;
use crate::api::response::ApiError;
use crate::dispatch::{self, DispatchError, Resolution, Snippet, TombstoneOnError};
use crate::AppState;

/// Resolve a short key.
/// Route: GET /:key (with or without a trailing extension)
pub async fn resolve_entry(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> Result<Response, ApiError> {
    let keys = key_store(&state)?;

    let resolution = dispatch::resolve(keys, state.object_store.as_ref(), &segment)
        .await
        .map_err(|e| match e {
            DispatchError::NotFound(_) => ApiError::not_found("Key not found"),
            DispatchError::Gone(_) => ApiError::gone("Content is no longer available"),
            other => ApiError::internal(other.to_string()),
        })?;

    let response = match resolution {
        Resolution::Snippet(snippet) => Html(render_snippet(&snippet)).into_response(),
        Resolution::Redirect(target) => {
            let location = header::HeaderValue::from_str(&target)
                .map_err(|_| ApiError::internal("Stored target is not a valid header value"))?;
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        Resolution::File {
            key,
            mime_type,
            reader,
        } => {
            let len = reader.len;
            let guarded = TombstoneOnError::new(reader.reader, keys.clone(), key);
            let mut response = Body::from_stream(ReaderStream::new(guarded)).into_response();
            let headers = response.headers_mut();

            headers.insert(
                header::CONTENT_TYPE,
                mime_type
                    .parse()
                    .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
            );
            headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));

            response
        }
    };

    Ok(response)
}

/// Render a code entry as a standalone HTML page.
pub fn render_snippet(snippet: &Snippet) -> String {
    let class = if snippet.language.is_empty() {
        String::new()
    } else {
        format!(" class=\"language-{}\"", escape_html(&snippet.language))
    };

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{key}</title>\n\
         <meta property=\"og:title\" content=\"{key}\">\n\
         <meta property=\"og:description\" content=\"{preview}\">\n\
         </head>\n\
         <body>\n\
         <pre><code{class}>{content}</code></pre>\n\
         </body>\n\
         </html>\n",
        key = escape_html(&snippet.key),
        preview = escape_html(&snippet.preview),
        content = escape_html(&snippet.content),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_snippet_escapes_content() {
        let html = render_snippet(&Snippet {
            key: "abc12345".to_string(),
            preview: "<b>".to_string(),
            content: "<script>alert('x')</script>".to_string(),
            language: "html".to_string(),
        });

        assert!(html.contains("<code class=\"language-html\">"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_render_snippet_without_language() {
        let html = render_snippet(&Snippet {
            key: "abc12345".to_string(),
            preview: String::new(),
            content: "plain".to_string(),
            language: String::new(),
        });
        assert!(html.contains("<pre><code>plain</code></pre>"));
    }
}
