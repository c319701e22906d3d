use thiserror::Error;

/// Parse-level errors for a single sentence.
///
/// These never escape [`crate::LogReader`], which absorbs and logs them —
/// a malformed line must not abort a log pass.
///
#[derive(Debug, Error)]
pub enum SentenceError {
    #[error("empty line")]
    Empty,
    #[error("missing '$' framing")]
    BadFraming,
    #[error("bad checksum, computed {computed:02X} got {found}")]
    BadChecksum { computed: u8, found: String },
    #[error("unknown tag {0}")]
    UnknownTag(String),
    #[error("not enough fields for {0}")]
    TooShort(String),
    #[error("bad {field} field in {tag}: {value}")]
    BadField {
        tag: String,
        field: &'static str,
        value: String,
    },
}
