use anyhow::Result;
use epg_repacker::parser::{ChannelWhitelist, SourceEncoding, XmlFilter};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tempfile::tempdir;

const GUIDE: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n",
    "<tv source-info-name=\"test\">\n",
    "  <channel id=\"1\"><display-name>One</display-name></channel>\n",
    "  <channel id=\"2\"><display-name>Two</display-name></channel>\n",
    "  <channel id=\"3\"><display-name>Three</display-name></channel>\n",
    "  <!-- listings -->\n",
    "  <programme start=\"20240101060000 +0000\" channel=\"1\"><title>Morning</title></programme>\n",
    "  <programme start=\"20240101070000 +0000\" channel=\"4\"><title>Elsewhere</title></programme>\n",
    "</tv>\n"
);

const EXPECTED: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n",
    "<tv source-info-name=\"test\">\n",
    "<channel id=\"1\"><display-name>One</display-name></channel>\n",
    "<channel id=\"2\"><display-name>Two</display-name></channel>\n",
    "<programme start=\"20240101060000 +0000\" channel=\"1\"><title>Morning</title></programme>\n",
    "</tv>"
);

fn whitelist() -> ChannelWhitelist {
    ChannelWhitelist::from_lines(["1", "2"])
}

#[test]
fn test_local_plain_guide_keeps_whitelisted_channels_in_order() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("guide.xml");
    let result = dir.path().join("filtered.xml");
    std::fs::write(&source, GUIDE)?;

    let stats = XmlFilter::new(whitelist()).filter_file(&source, SourceEncoding::Plain, &result)?;

    assert_eq!(std::fs::read_to_string(&result)?, EXPECTED);
    assert_eq!(stats.channels_kept, 2);
    assert_eq!(stats.programmes_kept, 1);
    assert_eq!(stats.dropped, 2);
    Ok(())
}

#[test]
fn test_gzip_source_is_decompressed_transparently() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("guide.xml.gz");
    let result = dir.path().join("filtered.xml");

    let mut encoder = GzEncoder::new(std::fs::File::create(&source)?, Compression::default());
    encoder.write_all(GUIDE.as_bytes())?;
    encoder.finish()?;

    XmlFilter::new(whitelist()).filter_file(&source, SourceEncoding::from_path(&source), &result)?;

    assert_eq!(std::fs::read_to_string(&result)?, EXPECTED);
    Ok(())
}

#[test]
fn test_filtering_own_output_changes_nothing() -> Result<()> {
    let filter = XmlFilter::new(whitelist());

    let mut first = Vec::new();
    filter.filter(GUIDE.as_bytes(), &mut first)?;
    let mut second = Vec::new();
    let stats = filter.filter(first.as_slice(), &mut second)?;

    assert_eq!(first, second);
    assert_eq!(stats.dropped, 0);
    Ok(())
}

#[test]
fn test_empty_whitelist_keeps_only_the_frame() -> Result<()> {
    let mut output = Vec::new();
    let stats = XmlFilter::new(ChannelWhitelist::default()).filter(GUIDE.as_bytes(), &mut output)?;

    assert_eq!(
        String::from_utf8(output)?,
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n",
            "<tv source-info-name=\"test\">\n",
            "</tv>"
        )
    );
    assert_eq!(stats.kept(), 0);
    assert_eq!(stats.dropped, 5);
    Ok(())
}
