// Guide document filtering: channel whitelist and the streaming XML rewrite

pub mod whitelist;
pub mod xml_filter;

use std::path::Path;

pub use whitelist::{ChannelWhitelist, WhitelistOptions};
pub use xml_filter::{
    decide, ElementKind, FilterDecision, FilterError, FilterStats, XmlFilter,
};

/// How the filter should read a source file. Chosen from the file name, never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Plain,
    Gzip,
}

impl SourceEncoding {
    pub fn from_path(path: &Path) -> Self {
        if crate::paths::is_gzip_path(path) {
            SourceEncoding::Gzip
        } else {
            SourceEncoding::Plain
        }
    }
}
