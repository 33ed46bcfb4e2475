use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::app::ports::Packer;
use crate::config::GzipCompression;

pub struct GzipPacker {
    level: Compression,
}

impl GzipPacker {
    pub fn new(compression: GzipCompression) -> Self {
        Self {
            level: level_for(compression),
        }
    }
}

fn level_for(compression: GzipCompression) -> Compression {
    match compression {
        GzipCompression::Optimal => Compression::default(),
        GzipCompression::Fastest => Compression::fast(),
        GzipCompression::NoCompression => Compression::none(),
        GzipCompression::SmallestSize => Compression::best(),
    }
}

impl Packer for GzipPacker {
    fn pack(&self, source: &Path, dest: &Path) -> io::Result<()> {
        let mut input = BufReader::new(File::open(source)?);
        let output = BufWriter::new(File::create(dest)?);

        let mut encoder = GzEncoder::new(output, self.level);
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_pack_produces_readable_gzip() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("guide.xml");
        let dest = dir.path().join("guide.xml.gz");
        std::fs::write(&source, "<tv>\n<channel id=\"a\"/>\n</tv>").unwrap();

        GzipPacker::new(GzipCompression::SmallestSize).pack(&source, &dest).unwrap();

        let mut unpacked = String::new();
        GzDecoder::new(File::open(&dest).unwrap()).read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, "<tv>\n<channel id=\"a\"/>\n</tv>");
    }

    #[test]
    fn test_pack_missing_source_fails() {
        let dir = tempdir().unwrap();
        let packer = GzipPacker::new(GzipCompression::Fastest);

        assert!(packer.pack(&dir.path().join("missing.xml"), &dir.path().join("out.gz")).is_err());
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_for(GzipCompression::NoCompression).level(), 0);
        assert_eq!(level_for(GzipCompression::Fastest).level(), 1);
        assert_eq!(level_for(GzipCompression::SmallestSize).level(), 9);
    }
}
