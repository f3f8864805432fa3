//! Feed retrieval and decoding.
//!
//! - [`fetcher`] - HTTP retrieval with a bounded timeout and size limit
//! - [`parser`] - RSS 2.0 document parsing with `quick-xml`
//! - [`normalizer`] - raw entry → [`PostCandidate`], including `pubDate` parsing
//!
//! A fetch either yields a whole [`Document`] or a [`FetchError`]; entries of
//! a document are then normalized one by one, so a bad entry only costs that
//! entry.

mod fetcher;
mod normalizer;
mod parser;

pub use fetcher::{DocumentFetcher, FetchError, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
pub use normalizer::{normalize, parse_pub_date, NormalizationError, PostCandidate, RFC1123Z};
pub use parser::{parse_document, Document, ParseError, RawEntry};
