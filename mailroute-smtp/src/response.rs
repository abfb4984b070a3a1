//! SMTP reply parsing and EHLO capability inspection.

use super::error::{ClientError, Result};

/// A single line of an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// The SMTP status code (e.g., 220, 250, 550).
    pub code: u16,
    /// Whether this is the last line in a multi-line reply.
    pub is_last: bool,
    /// The text following the status code.
    pub message: String,
}

/// A complete SMTP reply, which may span several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The SMTP status code.
    pub code: u16,
    /// All text lines in the reply.
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns the complete text with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx, sent while the server waits for more input (DATA, AUTH challenges).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// 4xx
    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// 5xx
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_temporary_error() || self.is_permanent_error()
    }

    /// Returns the EHLO keywords advertised in this reply.
    ///
    /// The first line of an EHLO reply is the server greeting and is skipped.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
    }

    /// Returns `true` if the EHLO reply advertises `keyword` (case-insensitive).
    #[must_use]
    pub fn has_extension(&self, keyword: &str) -> bool {
        self.extensions()
            .any(|extension| extension.eq_ignore_ascii_case(keyword))
    }

    /// Returns the SASL mechanisms listed on the `AUTH` line, upper-cased.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<String> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                let keyword = words.next()?;
                // Some servers still send the pre-standard `AUTH=PLAIN LOGIN` form.
                let keyword = keyword.split('=').next().unwrap_or(keyword);
                keyword.eq_ignore_ascii_case("AUTH").then(|| {
                    line.split(|c: char| c.is_whitespace() || c == '=')
                        .skip(1)
                        .filter(|word| !word.is_empty())
                        .map(str::to_ascii_uppercase)
                        .collect::<Vec<_>>()
                })
            })
            .flatten()
            .collect()
    }

    /// Parses a single reply line (without its line terminator).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line doesn't match SMTP format.
    pub fn parse_line(line: &str) -> Result<ResponseLine> {
        let code = line
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ClientError::ParseError(format!("Invalid reply line: '{line}'")))?;

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(&other) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator character: '{}'",
                    char::from(other)
                )));
            }
        };

        Ok(ResponseLine {
            code,
            is_last,
            message: line.get(4..).unwrap_or_default().to_string(),
        })
    }

    /// Parses a complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes consumed, or `None` when the
    /// buffer does not yet hold a full reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the reply is malformed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        for raw in buffer.split_inclusive(|&b| b == b'\n') {
            if raw.last() != Some(&b'\n') {
                break;
            }
            consumed += raw.len();

            let text = std::str::from_utf8(raw)?.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }

            let line = Self::parse_line(text)?;
            match code {
                Some(expected) if expected != line.code => {
                    return Err(ClientError::ParseError(format!(
                        "Status code mismatch in multi-line reply: expected {expected}, got {}",
                        line.code
                    )));
                }
                _ => code = Some(line.code),
            }

            lines.push(line.message);
            if line.is_last {
                return Ok(code.map(|code| (Self::new(code, lines), consumed)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn ehlo(lines: &[&str]) -> Response {
        Response::new(250, lines.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_parse_single_line() {
        assert_eq!(
            Response::parse_line("220 smtp.example.test ESMTP").unwrap(),
            ResponseLine {
                code: 220,
                is_last: true,
                message: "smtp.example.test ESMTP".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Response::parse_line("hello").is_err());
        assert!(Response::parse_line("25").is_err());
        assert!(Response::parse_line("250*OK").is_err());
    }

    #[test]
    fn test_parse_multi_line_response() {
        let data = b"250-smtp.example.test\r\n250-STARTTLS\r\n250 AUTH PLAIN LOGIN\r\n";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.code, 250);
        assert_eq!(
            response.lines,
            vec!["smtp.example.test", "STARTTLS", "AUTH PLAIN LOGIN"]
        );
        assert_eq!(consumed, data.len());
    }

    #[test]
    fn test_parse_incomplete_response() {
        let data = b"250-smtp.example.test\r\n250-SIZE";
        assert!(Response::parse_response(data).unwrap().is_none());
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let data = b"334 \r\n235 ok\r\n";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.code, 334);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_code_mismatch_is_error() {
        let data = b"250-first\r\n251 second\r\n";
        assert!(Response::parse_response(data).is_err());
    }

    #[test]
    fn test_extensions_skip_greeting() {
        let response = ehlo(&["smtp.example.test greets you", "STARTTLS", "SIZE 1000"]);
        assert!(response.has_extension("starttls"));
        assert!(response.has_extension("SIZE"));
        assert!(!response.has_extension("smtp.example.test"));
    }

    #[test]
    fn test_auth_mechanisms() {
        let response = ehlo(&["smtp.example.test", "AUTH plain LOGIN", "AUTH=CRAM-MD5"]);
        assert!(response.has_extension("AUTH"));
        assert_eq!(
            response.auth_mechanisms(),
            vec!["PLAIN", "LOGIN", "CRAM-MD5"]
        );
    }

    #[test]
    fn test_no_auth_line() {
        let response = ehlo(&["smtp.example.test", "8BITMIME"]);
        assert!(response.auth_mechanisms().is_empty());
    }

    #[test]
    fn test_classification() {
        assert!(Response::new(250, vec![]).is_success());
        assert!(Response::new(334, vec![]).is_intermediate());
        assert!(Response::new(421, vec![]).is_temporary_error());
        assert!(Response::new(535, vec![]).is_permanent_error());
        assert!(Response::new(535, vec![]).is_error());
    }
}
