//! dse.ldif reading and writing.

pub mod parser;
pub mod writer;

pub use parser::{parse_entries, parse_file, parse_string, read_optional};
pub use writer::{WriteOptions, write_entries, write_file, write_string};
