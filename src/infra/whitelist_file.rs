use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::app::ports::WhitelistSource;
use crate::parser::{ChannelWhitelist, WhitelistOptions};

/// Whitelist stored as a text file, one channel id per line.
#[derive(Debug, Default, Clone)]
pub struct FileWhitelistSource {
    options: WhitelistOptions,
}

impl FileWhitelistSource {
    pub fn new(options: WhitelistOptions) -> Self {
        Self { options }
    }
}

impl WhitelistSource for FileWhitelistSource {
    fn load(&self, path: &Path) -> io::Result<ChannelWhitelist> {
        let lines = BufReader::new(File::open(path)?)
            .lines()
            .collect::<io::Result<Vec<String>>>()?;

        let whitelist = ChannelWhitelist::from_lines_with(lines, self.options);
        debug!("Loaded {} channel ids from '{}'", whitelist.len(), path.display());
        Ok(whitelist)
    }
}
