//! `multipart/form-data` bodies.
//!
//! # Design
//! A [`MultipartFormData`] is an ordered list of [`BodyPart`]s plus a
//! boundary fixed at construction. Parts do not hold open handles: each part
//! keeps a [`ByteSource`] that is opened once per [`MultipartFormData::encode`]
//! call, read fully in 1 KiB chunks and dropped before the next part is
//! opened. A form can therefore be encoded again when a request is retried.
//!
//! Wire layout, CRLF line endings throughout:
//!
//! ```text
//! --boundary\r\n                 initial boundary, first part only
//! Name: Value\r\n                one line per part header
//! \r\n
//! <part bytes>
//! \r\n--boundary\r\n             encapsulated boundary, between parts
//! ...
//! \r\n--boundary--\r\n           final boundary, after the last part
//! ```
//!
//! A form without parts encodes to an empty body.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::MultipartError;
use crate::http::{ContentType, HeaderKey};

const CRLF: &str = "\r\n";
const CHUNK_SIZE: usize = 1024;

/// Where a boundary marker sits relative to the parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Initial,
    Encapsulated,
    Final,
}

impl Boundary {
    fn render(self, boundary: &str) -> String {
        match self {
            Boundary::Initial => format!("--{boundary}{CRLF}"),
            Boundary::Encapsulated => format!("{CRLF}--{boundary}{CRLF}"),
            Boundary::Final => format!("{CRLF}--{boundary}--{CRLF}"),
        }
    }
}

/// A re-openable source of part bytes.
pub trait ByteSource: Send + Sync {
    /// Open a fresh reader positioned at the start of the content.
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;
}

impl ByteSource for Bytes {
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(io::Cursor::new(self.clone())))
    }
}

/// Part content read from a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// One part of a multipart form.
#[derive(Clone)]
pub struct BodyPart {
    headers: Vec<(HeaderKey, String)>,
    source: Arc<dyn ByteSource>,
    length: u64,
}

impl BodyPart {
    pub fn headers(&self) -> &[(HeaderKey, String)] {
        &self.headers
    }

    /// Number of bytes the source is expected to yield.
    pub fn length(&self) -> u64 {
        self.length
    }

    fn encode_headers(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}{CRLF}").as_bytes());
        }
        out.extend_from_slice(CRLF.as_bytes());
    }

    /// Append the source's bytes to `out`. The reader is dropped on every
    /// return path, including read errors.
    fn encode_source(&self, out: &mut Vec<u8>) -> Result<(), MultipartError> {
        let mut reader = self.source.open().map_err(MultipartError::SourceUnavailable)?;
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut read_total: u64 = 0;

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    out.extend_from_slice(&buffer[..n]);
                    read_total += n as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(MultipartError::ReadFailed(err)),
            }
        }

        if read_total != self.length {
            return Err(MultipartError::PartLengthMismatch {
                expected: self.length,
                actual: read_total,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyPart")
            .field("headers", &self.headers)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone)]
pub struct MultipartFormData {
    boundary: String,
    parts: Vec<BodyPart>,
}

impl Default for MultipartFormData {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartFormData {
    /// Create an empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::multipart(&self.boundary)
    }

    /// Add an in-memory part.
    pub fn add_data(
        &mut self,
        data: impl Into<Bytes>,
        name: &str,
        filename: Option<&str>,
        mime_type: Option<&str>,
    ) -> &mut Self {
        let data: Bytes = data.into();
        let length = data.len() as u64;
        self.add_source(data, length, name, filename, mime_type)
    }

    /// Add a part read from `path` at encode time.
    ///
    /// The filename comes from the path and the MIME type is guessed from its
    /// extension. The declared length is the file size right now; a file that
    /// changes size before encoding fails with `PartLengthMismatch`.
    pub fn add_file(&mut self, path: impl AsRef<Path>, name: &str) -> Result<&mut Self, MultipartError> {
        let path = path.as_ref();
        let length = std::fs::metadata(path)
            .map_err(|source| MultipartError::FileSizeUnavailable {
                path: path.display().to_string(),
                source,
            })?
            .len();
        let filename = path.file_name().map(|name| name.to_string_lossy().into_owned());
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(ContentType::OCTET_STREAM.as_str())
            .to_string();

        Ok(self.add_source(
            FileSource::new(path),
            length,
            name,
            filename.as_deref(),
            Some(&mime_type),
        ))
    }

    /// Add a part backed by a custom source declaring `length` bytes.
    pub fn add_source(
        &mut self,
        source: impl ByteSource + 'static,
        length: u64,
        name: &str,
        filename: Option<&str>,
        mime_type: Option<&str>,
    ) -> &mut Self {
        self.parts.push(BodyPart {
            headers: part_headers(name, filename, mime_type),
            source: Arc::new(source),
            length,
        });
        self
    }

    /// Encode every part into wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, MultipartError> {
        let mut encoded = Vec::new();
        let last = self.parts.len().saturating_sub(1);

        for (index, part) in self.parts.iter().enumerate() {
            let opening = if index == 0 {
                Boundary::Initial
            } else {
                Boundary::Encapsulated
            };
            encoded.extend_from_slice(opening.render(&self.boundary).as_bytes());
            part.encode_headers(&mut encoded);
            part.encode_source(&mut encoded)?;

            if index == last {
                encoded.extend_from_slice(Boundary::Final.render(&self.boundary).as_bytes());
            }
        }

        Ok(encoded)
    }
}

fn part_headers(name: &str, filename: Option<&str>, mime_type: Option<&str>) -> Vec<(HeaderKey, String)> {
    let mut disposition = format!("form-data; name=\"{name}\"");
    if let Some(filename) = filename {
        disposition.push_str(&format!("; filename=\"{filename}\""));
    }

    let mut headers = vec![(HeaderKey::CONTENT_DISPOSITION, disposition)];
    if let Some(mime_type) = mime_type {
        headers.push((HeaderKey::CONTENT_TYPE, mime_type.to_string()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn text(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn content_type_contains_boundary() {
        let form = MultipartFormData::with_boundary("boundary");
        assert_eq!(form.content_type(), ContentType::multipart("boundary"));
    }

    #[test]
    fn add_data_without_filename_and_mime_type() {
        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_data("hello from the client", "data", None, None);

        assert_eq!(form.parts().len(), 1);
        assert_eq!(
            form.parts()[0].headers(),
            &[(HeaderKey::CONTENT_DISPOSITION, "form-data; name=\"data\"".to_string())]
        );
    }

    #[test]
    fn add_data_with_filename_and_mime_type() {
        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_data("alpha", "first", None, None)
            .add_data("beta", "second", Some("second.txt"), Some("text/plain"));

        assert_eq!(form.parts().len(), 2);
        assert_eq!(
            form.parts()[1].headers(),
            &[
                (
                    HeaderKey::CONTENT_DISPOSITION,
                    "form-data; name=\"second\"; filename=\"second.txt\"".to_string()
                ),
                (HeaderKey::CONTENT_TYPE, "text/plain".to_string()),
            ]
        );
    }

    #[test]
    fn encode_single_part() {
        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_data("hello from the client", "data", None, None);

        let encoded = form.encode().unwrap();
        assert_eq!(
            text(&encoded),
            "--boundary\r\n\
             Content-Disposition: form-data; name=\"data\"\r\n\
             \r\n\
             hello from the client\
             \r\n--boundary--\r\n"
        );
    }

    #[test]
    fn encode_two_parts_interleaves_encapsulated_boundary() {
        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_data("alpha", "first", None, None)
            .add_data("beta", "second", Some("second.txt"), Some("text/plain"));

        let encoded = form.encode().unwrap();
        assert_eq!(
            text(&encoded),
            "--boundary\r\n\
             Content-Disposition: form-data; name=\"first\"\r\n\
             \r\n\
             alpha\
             \r\n--boundary\r\n\
             Content-Disposition: form-data; name=\"second\"; filename=\"second.txt\"\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             beta\
             \r\n--boundary--\r\n"
        );
    }

    #[test]
    fn empty_form_encodes_to_empty_body() {
        let form = MultipartFormData::with_boundary("boundary");
        assert!(form.encode().unwrap().is_empty());
        assert_eq!(form.content_type().as_str(), "multipart/form-data; boundary=boundary");
    }

    #[test]
    fn random_boundary_is_stable_per_instance() {
        let mut form = MultipartFormData::new();
        let boundary = form.boundary().to_string();
        form.add_data("a", "a", None, None);

        assert_eq!(form.boundary(), boundary);
        assert_eq!(form.encode().unwrap(), form.encode().unwrap());
        assert_ne!(MultipartFormData::new().boundary(), boundary);
    }

    #[test]
    fn encoded_parts_split_back_on_boundary() {
        let mut form = MultipartFormData::with_boundary("XyZ");
        form.add_data("first", "one", None, None)
            .add_data(vec![0u8, 13, 10, 255], "two", Some("raw.bin"), Some("application/octet-stream"))
            .add_data("", "three", None, None);

        let encoded = form.encode().unwrap();
        let body = &encoded[b"--XyZ\r\n".len()..encoded.len() - b"\r\n--XyZ--\r\n".len()];
        let sections: Vec<&[u8]> = split(body, b"\r\n--XyZ\r\n");
        assert_eq!(sections.len(), 3);

        let expected: [&[u8]; 3] = [b"first", &[0, 13, 10, 255], b""];
        for ((section, part), content) in sections.iter().zip(form.parts()).zip(expected) {
            let header_end = find(section, b"\r\n\r\n").unwrap();
            let header_text = text(&section[..header_end]);
            let headers: Vec<String> = part
                .headers()
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            assert_eq!(header_text, headers.join("\r\n"));
            assert_eq!(&section[header_end + 4..], content);
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|window| window == needle)
    }

    fn split<'a>(mut haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
        let mut sections = Vec::new();
        while let Some(at) = find(haystack, needle) {
            sections.push(&haystack[..at]);
            haystack = &haystack[at + needle.len()..];
        }
        sections.push(haystack);
        sections
    }

    #[test]
    fn add_file_uses_file_name_and_guessed_mime_type() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG fake image").unwrap();
        let file_name = file.path().file_name().unwrap().to_string_lossy().into_owned();

        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_file(file.path(), "image").unwrap();

        let part = &form.parts()[0];
        assert_eq!(part.length(), 15);
        assert_eq!(
            part.headers()[0].1,
            format!("form-data; name=\"image\"; filename=\"{file_name}\"")
        );
        assert_eq!(part.headers()[1], (HeaderKey::CONTENT_TYPE, "image/png".to_string()));

        let encoded = form.encode().unwrap();
        assert!(find(&encoded, b"\r\n\r\n\x89PNG fake image\r\n--boundary--\r\n").is_some());
    }

    #[test]
    fn add_file_with_unknown_extension_falls_back_to_octet_stream() {
        let mut file = tempfile::Builder::new().suffix(".zzunknown").tempfile().unwrap();
        file.write_all(b"data").unwrap();

        let mut form = MultipartFormData::with_boundary("boundary");
        form.add_file(file.path(), "blob").unwrap();

        assert_eq!(form.parts()[0].headers()[1].1, "application/octet-stream");
    }

    #[test]
    fn add_missing_file_reports_size_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = MultipartFormData::new();
        let err = form.add_file(dir.path().join("missing.txt"), "missing").unwrap_err();
        assert!(matches!(err, MultipartError::FileSizeUnavailable { .. }));
    }

    #[test]
    fn file_grown_after_add_is_a_length_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"1234").unwrap();

        let mut form = MultipartFormData::new();
        form.add_file(file.path(), "file").unwrap();
        file.write_all(b"5678").unwrap();
        file.flush().unwrap();

        let err = form.encode().unwrap_err();
        assert!(matches!(
            err,
            MultipartError::PartLengthMismatch { expected: 4, actual: 8 }
        ));
    }

    #[test]
    fn file_removed_after_add_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.txt");
        std::fs::write(&path, b"content").unwrap();

        let mut form = MultipartFormData::new();
        form.add_file(&path, "file").unwrap();
        std::fs::remove_file(&path).unwrap();

        let err = form.encode().unwrap_err();
        assert!(matches!(err, MultipartError::SourceUnavailable(_)));
    }

    /// Source whose readers fail after yielding a few bytes.
    struct FailingSource {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct FailingReader {
        closed: Arc<AtomicUsize>,
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::other("disk gone"));
            }
            self.served = true;
            buf[..3].copy_from_slice(b"abc");
            Ok(3)
        }
    }

    impl Drop for FailingReader {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ByteSource for FailingSource {
        fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FailingReader {
                closed: self.closed.clone(),
                served: false,
            }))
        }
    }

    #[test]
    fn read_failure_closes_source() {
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let mut form = MultipartFormData::new();
        form.add_source(
            FailingSource {
                opened: opened.clone(),
                closed: closed.clone(),
            },
            10,
            "broken",
            None,
            None,
        );

        let err = form.encode().unwrap_err();
        assert!(matches!(err, MultipartError::ReadFailed(_)));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn large_source_is_read_across_chunks() {
        let payload = vec![b'x'; CHUNK_SIZE * 3 + 7];
        let mut form = MultipartFormData::with_boundary("b");
        form.add_data(payload.clone(), "big", None, None);

        let encoded = form.encode().unwrap();
        let prefix = b"--b\r\nContent-Disposition: form-data; name=\"big\"\r\n\r\n".len();
        assert_eq!(&encoded[prefix..prefix + payload.len()], payload.as_slice());
    }
}
