use std::fs;
use std::io;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
    pub encoding: &'static Encoding,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
    #[error("cannot write {encoding} back: {message}")]
    EncodeFailure { encoding: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },
}

/// Decode page bytes into UTF-8 using: BOM -> strict UTF-8 -> chardetng guess.
pub fn decode_html(bytes: &[u8]) -> Result<DecodedHtml, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    // Generated documentation is nearly always UTF-8 already.
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedHtml {
            html: text.to_string(),
            encoding_label: UTF_8.name().to_string(),
            encoding: UTF_8,
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

/// Reads and decodes one HTML page from disk.
pub fn load_page(path: &Path) -> Result<String, PageError> {
    read_page(path).map(|decoded| decoded.html)
}

/// Like [`load_page`], keeping the encoding the page was stored in.
pub fn read_page(path: &Path) -> Result<DecodedHtml, PageError> {
    let bytes = fs::read(path).map_err(|source| PageError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_html(&bytes).map_err(|source| PageError::Decode {
        path: path.display().to_string(),
        source,
    })
}

/// Encodes `text` in the encoding a page was read with, so its
/// `<meta charset>` stays truthful.
pub fn encode_html(text: &str, encoding: &'static Encoding) -> Result<Vec<u8>, DecodeError> {
    // UTF-16 pages would come out as UTF-8.
    if encoding.output_encoding() != encoding {
        return Err(DecodeError::EncodeFailure {
            encoding: encoding.name().to_string(),
            message: "encoding cannot be written".into(),
        });
    }
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(DecodeError::EncodeFailure {
            encoding: encoding.name().to_string(),
            message: "unmappable characters".into(),
        });
    }
    Ok(bytes.into_owned())
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedHtml, DecodeError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: enc.name().to_string(),
            message: "decoding error".into(),
        });
    }
    Ok(DecodedHtml {
        html: text.into_owned(),
        encoding_label: enc.name().to_string(),
        encoding: enc,
    })
}
