//! Stream request: the same request is replayed on every reconnect.

use std::collections::BTreeMap;
use std::fmt;

use url::Url;

use super::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    url: Url,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl StreamRequest {
    /// GET request for an http(s) URL.
    pub fn get(url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::invalid_request(format!("invalid URL {:?}: {}", url, e)))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::invalid_request(format!(
                    "unsupported URL scheme {:?}",
                    other
                )))
            }
        }
        Ok(Self {
            url,
            method: Method::Get,
            headers: Vec::new(),
            body: None,
        })
    }

    /// POST request with a form or JSON body (e.g. filter parameters).
    pub fn post(url: &str, body: impl Into<Vec<u8>>) -> Result<Self, TransportError> {
        let mut req = Self::get(url)?;
        req.method = Method::Post;
        req.body = Some(body.into());
        Ok(req)
    }

    /// Add a header. Names and values are trimmed; empty names or line breaks are rejected.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || name.contains(':') {
            return Err(TransportError::invalid_request(format!(
                "invalid header name {:?}",
                name
            )));
        }
        if [name, value].iter().any(|s| s.contains(|c: char| c == '\r' || c == '\n')) {
            return Err(TransportError::invalid_request(
                "header contains a line break",
            ));
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(self)
    }

    /// Add every header from a config table.
    pub fn headers(mut self, headers: &BTreeMap<String, String>) -> Result<Self, TransportError> {
        for (name, value) in headers {
            self = self.header(name, value)?;
        }
        Ok(self)
    }

    /// Parse a `Name: value` header line, as given on the command line.
    pub fn header_line(self, line: &str) -> Result<Self, TransportError> {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            TransportError::invalid_request(format!("header {:?} is not `Name: value`", line))
        })?;
        self.header(name, value)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportErrorKind;

    #[test]
    fn get_accepts_http_and_https() {
        let req = StreamRequest::get("https://stream.example.com/1.1/statuses/sample.json").unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.url().host_str(), Some("stream.example.com"));
        assert!(req.body().is_none());
        assert!(StreamRequest::get("http://127.0.0.1:8080/").is_ok());
    }

    #[test]
    fn get_rejects_bad_urls() {
        let err = StreamRequest::get("not a url").unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::InvalidRequest);
        let err = StreamRequest::get("ftp://example.com/file").unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::InvalidRequest);
    }

    #[test]
    fn post_carries_body() {
        let req = StreamRequest::post("https://example.com/filter", "track=rust").unwrap();
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.body(), Some(&b"track=rust"[..]));
    }

    #[test]
    fn header_lines_are_split_and_trimmed() {
        let req = StreamRequest::get("https://example.com/")
            .unwrap()
            .header_line("Authorization:  Bearer abc ")
            .unwrap();
        assert_eq!(
            req.header_pairs(),
            &[("Authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[test]
    fn bad_headers_rejected() {
        let base = StreamRequest::get("https://example.com/").unwrap();
        assert!(base.clone().header_line("no colon").is_err());
        assert!(base.clone().header("", "x").is_err());
        assert!(base.header("X-Test", "a\r\nInjected: 1").is_err());
    }
}
