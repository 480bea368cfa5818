use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// A response received from the transport.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, `None` if absent or not visible ASCII/UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Whether the status is a failure (4xx or 5xx).
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_json_decoding() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), br#"[{"id":1},{"id":2}]"#.to_vec());
        let items: Vec<Item> = response.json().unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn test_is_error() {
        let ok = Response::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new());
        let missing = Response::new(StatusCode::NOT_FOUND, HeaderMap::new(), Vec::new());
        let broken = Response::new(StatusCode::BAD_GATEWAY, HeaderMap::new(), Vec::new());

        assert!(!ok.is_error());
        assert!(missing.is_error());
        assert!(broken.is_error());
    }

    #[test]
    fn test_text_is_lossy() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), vec![b'h', b'i', 0xff]);
        assert!(response.text().starts_with("hi"));
    }
}
