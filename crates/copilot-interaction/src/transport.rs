//! HTTP transport helpers shared by the streaming backends.

use std::ops::ControlFlow;

use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode, header};
use tokio_util::sync::CancellationToken;

use copilot_core::{Accumulator, ExchangeOutcome, Progress, Renderer, StreamEvent, TransportError};

/// Maps a reqwest failure to a transport error class.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::EndedPrematurely(err.to_string())
    } else if let Some(status) = err.status() {
        classify_status(status).unwrap_or_else(|| TransportError::Request(err.to_string()))
    } else {
        TransportError::Request(err.to_string())
    }
}

/// `None` for success, otherwise the failure class of a response status.
pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => TransportError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => TransportError::TooManyRequests,
        other => TransportError::Status(other.as_u16()),
    })
}

/// How reading a response body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The body was read to the end.
    Closed,
    /// The line callback asked to stop.
    Stopped,
    Cancelled,
    Failed(TransportError),
}

/// Splits a streamed body into lines and feeds them to `on_line`.
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// chunks survive. A trailing line without newline is flushed at the end.
pub async fn read_lines(
    response: Response,
    cancel: &CancellationToken,
    mut on_line: impl FnMut(&str) -> ControlFlow<()>,
) -> StreamEnd {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let text = String::from_utf8_lossy(&line);
                    if on_line(text.trim_end_matches(['\r', '\n'])).is_break() {
                        return StreamEnd::Stopped;
                    }
                }
            }
            Some(Err(e)) => return StreamEnd::Failed(classify_reqwest_error(&e)),
            None => break,
        }
    }

    if !buffer.is_empty() {
        let text = String::from_utf8_lossy(&buffer);
        if on_line(text.trim_end_matches('\r')).is_break() {
            return StreamEnd::Stopped;
        }
    }
    StreamEnd::Closed
}

/// How one exchange ended from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeEnd {
    Finished(ExchangeOutcome),
    Cancelled,
}

/// Result of a streamed HTTP exchange.
#[derive(Debug)]
pub struct HttpExchange {
    pub end: ExchangeEnd,
    /// `Set-Cookie` values of a successful response.
    pub set_cookie: Vec<String>,
}

/// Sends `request`, checks the status, and folds the decoded body into `acc`.
///
/// Every failure is turned into a [`StreamEvent::ConnectionProblem`] so the
/// accumulator renders it; nothing is returned as an error.
pub async fn stream_exchange(
    request: RequestBuilder,
    decode: impl Fn(&str) -> Vec<StreamEvent>,
    acc: &mut Accumulator,
    renderer: &mut dyn Renderer,
    cancel: &CancellationToken,
) -> HttpExchange {
    let cancelled = HttpExchange {
        end: ExchangeEnd::Cancelled,
        set_cookie: Vec::new(),
    };

    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => return cancelled,
        sent = request.send() => sent,
    };

    let response = match sent {
        Ok(response) => response,
        Err(e) => return fail_exchange(acc, renderer, classify_reqwest_error(&e)),
    };

    tracing::debug!(status = %response.status(), "stream response received");
    if let Some(err) = classify_status(response.status()) {
        return fail_exchange(acc, renderer, err);
    }

    let set_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect();

    let mut lines = 0usize;
    let end = read_lines(response, cancel, |line| {
        lines += 1;
        for event in decode(line) {
            if let Progress::Finished(_) = acc.apply(event, renderer) {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    })
    .await;
    tracing::debug!(lines, ?end, "stream finished");

    let end = match end {
        StreamEnd::Cancelled => ExchangeEnd::Cancelled,
        StreamEnd::Failed(err) => {
            let progress = acc.apply(StreamEvent::ConnectionProblem(err), renderer);
            ExchangeEnd::Finished(finished_outcome(progress))
        }
        StreamEnd::Closed | StreamEnd::Stopped => ExchangeEnd::Finished(acc.end_of_stream()),
    };

    HttpExchange { end, set_cookie }
}

fn fail_exchange(
    acc: &mut Accumulator,
    renderer: &mut dyn Renderer,
    err: TransportError,
) -> HttpExchange {
    let progress = acc.apply(StreamEvent::ConnectionProblem(err), renderer);
    HttpExchange {
        end: ExchangeEnd::Finished(finished_outcome(progress)),
        set_cookie: Vec::new(),
    }
}

fn finished_outcome(progress: Progress) -> ExchangeOutcome {
    match progress {
        Progress::Finished(outcome) => outcome,
        Progress::Continue => ExchangeOutcome::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(TransportError::Unauthorized)
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(TransportError::TooManyRequests)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(TransportError::Status(502))
        );
    }
}
