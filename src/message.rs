//! Plain-text message rendering and spooling
//!
//! A [`Message`] renders to the minimal header block a plain SMTP
//! submission expects, followed by the body verbatim. No MIME.

use chrono::{DateTime, FixedOffset, Local};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A message ready to hand to a driver. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    from: String,
    to: String,
    subject: String,
    body: String,
    date: DateTime<FixedOffset>,
}

impl Message {
    /// Build a message stamped with the current local time.
    pub fn new(from: &str, to: &str, subject: &str, body: &str) -> Self {
        Self::with_date(from, to, subject, body, Local::now().fixed_offset())
    }

    pub fn with_date(
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        date: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            from: single_line(from),
            to: single_line(to),
            subject: single_line(subject),
            body: body.to_string(),
            date,
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn date(&self) -> DateTime<FixedOffset> {
        self.date
    }

    /// RFC-2822 `Date` header value; always English day/month names.
    pub fn date_header(&self) -> String {
        self.date.to_rfc2822()
    }

    /// Serialize to the wire form: headers, blank line, body.
    pub fn render(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\n\r\n{}",
            self.from,
            self.to,
            self.subject,
            self.date_header(),
            self.body
        )
    }
}

/// Header values never carry line breaks.
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// The rendered message on disk.
///
/// The file lives exactly as long as this value; dropping it removes the
/// file whether the dispatch succeeded, failed, or returned early.
#[derive(Debug)]
pub struct SpooledMessage {
    file: NamedTempFile,
}

impl SpooledMessage {
    pub fn write(message: &Message) -> std::io::Result<Self> {
        Self::write_in(&std::env::temp_dir(), message)
    }

    pub fn write_in(dir: &Path, message: &Message) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("toolshed-message-")
            .suffix(".eml")
            .tempfile_in(dir)?;
        file.write_all(message.render().as_bytes())?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), "Spooled message");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn contents(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 0)
            .unwrap()
    }

    #[test]
    fn test_render_layout() {
        let message = Message::with_date("me@x.com", "a@x.com", "Hi", "Hello\nthere", fixed_date());

        assert_eq!(
            message.render(),
            "From: me@x.com\r\nTo: a@x.com\r\nSubject: Hi\r\nDate: Sat, 9 Mar 2024 14:05:00 +0000\r\n\r\nHello\nthere"
        );
    }

    #[test]
    fn test_two_builds_differ_only_in_date() {
        let first = Message::with_date("me@x.com", "a@x.com", "Hi", "Hello", fixed_date());
        let second = Message::with_date(
            "me@x.com",
            "a@x.com",
            "Hi",
            "Hello",
            fixed_date() + chrono::Duration::seconds(61),
        );

        let strip_date = |rendered: String| -> Vec<String> {
            rendered
                .split("\r\n")
                .filter(|l| !l.starts_with("Date: "))
                .map(str::to_string)
                .collect()
        };
        assert_ne!(first.render(), second.render());
        assert_eq!(strip_date(first.render()), strip_date(second.render()));
    }

    #[test]
    fn test_header_values_cannot_inject_headers() {
        let message = Message::new("me@x.com", "a@x.com", "Hi\r\nBcc: evil@x.com", "body");

        assert_eq!(message.subject(), "Hi Bcc: evil@x.com");
        assert!(!message.render().contains("\r\nBcc:"));
    }

    #[test]
    fn test_body_kept_verbatim() {
        let body = "line one\r\n\r\n  indented ünïcode\n";
        let message = Message::new("me@x.com", "a@x.com", "s", body);
        assert_eq!(message.body(), body);
        assert!(message.render().ends_with(body));
    }

    #[test]
    fn test_spool_removed_on_drop() {
        let message = Message::with_date("me@x.com", "a@x.com", "Hi", "Hello", fixed_date());
        let spool = SpooledMessage::write(&message).unwrap();
        let path = spool.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(spool.contents().unwrap(), message.render().into_bytes());

        drop(spool);
        assert!(!path.exists());
    }
}
