//! `rivulet tail` – print stream tokens until the stream ends, fails, hits
//! the limit, or Ctrl-C.

use std::io::Write;

use anyhow::{Context, Result};
use rivulet_core::config::RivuletConfig;
use rivulet_core::connection::{StreamEvent, StreamingConnection};
use rivulet_core::handler::HandlerChain;
use rivulet_core::parse::{JsonLinesParser, LineParser, TokenParser};
use rivulet_core::transport::{CurlTransport, StreamRequest};

#[derive(Debug, Clone)]
pub struct TailOptions {
    pub url: String,
    pub headers: Vec<String>,
    pub json: bool,
    pub limit: Option<usize>,
}

/// Config headers first, then command-line headers in order.
pub fn build_request(cfg: &RivuletConfig, opts: &TailOptions) -> Result<StreamRequest> {
    let mut request = StreamRequest::get(&opts.url)?
        .headers(&cfg.headers)
        .context("invalid header in config")?;
    for line in &opts.headers {
        request = request.header_line(line)?;
    }
    Ok(request)
}

pub async fn run_tail(cfg: &RivuletConfig, opts: &TailOptions) -> Result<()> {
    let request = build_request(cfg, opts)?;
    if opts.json {
        let parser = JsonLinesParser::<serde_json::Value>::new();
        tail(cfg, parser, request, opts.limit, |v| v.to_string()).await
    } else {
        tail(cfg, LineParser::new(), request, opts.limit, |s| s.clone()).await
    }
}

async fn tail<P: TokenParser>(
    cfg: &RivuletConfig,
    parser: P,
    request: StreamRequest,
    limit: Option<usize>,
    render: impl Fn(&P::Token) -> String,
) -> Result<()> {
    let handlers = HandlerChain::from_config(cfg)?;
    let conn = StreamingConnection::new(CurlTransport::from_config(cfg), parser, handlers);
    let mut sub = conn.subscribe()?;
    tracing::info!(url = %request.url(), "tailing stream");
    let task = conn.start(request);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut out = std::io::stdout();
    let mut printed = 0usize;
    let outcome = loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break Ok(());
            }
            event = sub.next() => event,
        };
        match event {
            Some(StreamEvent::Token(token)) => {
                writeln!(out, "{}", render(&token)).context("writing to stdout")?;
                printed += 1;
                if limit.is_some_and(|n| printed >= n) {
                    break Ok(());
                }
            }
            Some(StreamEvent::Error(e)) => break Err(anyhow::Error::new(e).context("stream failed")),
            Some(StreamEvent::Completed) | None => break Ok(()),
        }
    };

    conn.dispose();
    if let Ok(Err(e)) = task.await {
        tracing::debug!(error = %e, "connect ended with error");
    }
    tracing::info!(printed, "tail finished");
    outcome
}
