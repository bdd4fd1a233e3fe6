//! Artifact records and the conventions used to classify them.
//!
//! - [`ArtifactRecord`] - URL-keyed record carried through a cycle and persisted
//!   in the registry
//! - [`Category`] - filename/URL derived category
//! - [`dates`] - `dd/mm/yy` parsing and tolerant registry date formats

mod category;
pub mod dates;
mod record;

pub use category::Category;
pub use dates::{find_iso_date, parse_ddmmyy};
pub use record::{ArtifactRecord, decode_filename, filename_from_url};
