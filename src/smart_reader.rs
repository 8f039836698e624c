use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Opens a call file and transparently decompresses it when it starts with
/// the GZIP magic bytes. BGZF (the `bgzip`/`tabix` format) is a series of
/// concatenated GZIP members and is handled by the same decoder.
///
/// Detection is by content, not extension, so `calls.vcf` holding gzip data
/// and `calls.vcf.gz` holding plain text both open correctly.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let is_gzip = {
        let buf = reader.fill_buf()?;
        // GZIP magic: 1f 8b
        buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b
    };

    if is_gzip {
        tracing::debug!(path = %path.display(), "detected GZIP/BGZF input");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}
