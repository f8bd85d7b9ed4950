//! Conversion stages
//!
//! Each stage is a pure function over the previous stage's output. File
//! persistence lives in the orchestrator, not here.

pub mod normalize;
pub mod parse;
pub mod serialize;

pub use normalize::{NormalizeSettings, normalize_document};
pub use parse::{count_root_children, parse_document};
pub use serialize::{XMLTV_DTD, serialize_document};
