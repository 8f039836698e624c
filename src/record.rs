use std::{
    fmt,
    io::{self, BufRead},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::genotype::genotype_subfield;
use crate::smart_reader::open_input;

/// Minimum number of tab-separated columns in a data line:
/// CHROM, POS, ID, REF, ALT.
pub const MIN_FIELDS: usize = 5;

/// A data line carries a sample column only after the eight fixed VCF
/// columns and FORMAT.
const SAMPLE_COLUMN_MIN_FIELDS: usize = 10;

/// Identity of a variant for set comparisons. Two keys are equal only when
/// all four fields are textually equal.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub chromosome: String,
    pub position: String,
    pub reference: String,
    pub alternate: String,
}

impl VariantKey {
    pub fn new(
        chromosome: impl Into<String>,
        position: impl Into<String>,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position: position.into(),
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

/// One data line of a call file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariantRecord {
    pub line: u64,
    pub chromosome: String,
    pub position: String,
    pub id: String,
    pub reference: String,
    pub alternate: String,
    /// The sample column (`GT:...`), when the line has one.
    pub sample: Option<String>,
    raw: String,
}

impl VariantRecord {
    pub fn key(&self) -> VariantKey {
        VariantKey::new(
            self.chromosome.clone(),
            self.position.clone(),
            self.reference.clone(),
            self.alternate.clone(),
        )
    }

    /// Genotype subfield of the sample column. Records without a sample
    /// column report the missing call `"."`.
    pub fn genotype(&self) -> &str {
        self.sample.as_deref().map(genotype_subfield).unwrap_or(".")
    }

    /// The line exactly as read, without its line terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Parse a single non-header data line.
pub fn parse_record(line: &str) -> Result<VariantRecord, ParseErrorKind> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseErrorKind::MalformedRecord {
            found: fields.len(),
        });
    }

    let sample = if fields.len() >= SAMPLE_COLUMN_MIN_FIELDS {
        fields.last().map(|s| s.to_string())
    } else {
        None
    };

    Ok(VariantRecord {
        line: 0,
        chromosome: fields[0].to_string(),
        position: fields[1].to_string(),
        id: fields[2].to_string(),
        reference: fields[3].to_string(),
        alternate: fields[4].to_string(),
        sample,
        raw: line.to_string(),
    })
}

/// Iterator over the data records of a call file.
///
/// Meta-information lines (`##`) are skipped. The first column-header line
/// (`#CHROM ...`) is kept and exposed through [`Reader::column_header`].
pub struct Reader<R> {
    inner: R,
    line: u64,
    buf: String,
    column_header: Option<String>,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
            column_header: None,
        }
    }

    pub fn column_header(&self) -> Option<&str> {
        self.column_header.as_deref()
    }
}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<VariantRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
                    if trimmed.is_empty() || trimmed.starts_with("##") {
                        continue;
                    }
                    if trimmed.starts_with('#') {
                        if self.column_header.is_none() {
                            self.column_header = Some(trimmed.to_string());
                        }
                        continue;
                    }

                    let line = self.line;
                    return Some(
                        parse_record(trimmed)
                            .map(|mut record| {
                                record.line = line;
                                record
                            })
                            .map_err(|kind| ParseError {
                                line,
                                raw: trimmed.to_string(),
                                kind,
                            }),
                    );
                }
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line,
                        raw: String::new(),
                        kind: ParseErrorKind::Io(e),
                    }));
                }
            }
        }
    }
}

/// Errors that can arise while parsing a call record.
#[derive(Debug, Error)]
#[error("invalid record at line {line}")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, ParseErrorKind::MalformedRecord { .. })
    }
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("malformed record: expected at least 5 tab-delimited fields, found {found}")]
    MalformedRecord { found: usize },
}

/// Errors raised while loading a whole call file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Records of a call file together with its column-header line.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub column_header: Option<String>,
    pub records: Vec<VariantRecord>,
}

/// Collect the variant keys of a (possibly compressed) call file, failing on
/// the first malformed line.
pub fn load_keys(path: &Path) -> Result<Vec<VariantKey>, LoadError> {
    let reader = Reader::new(open(path)?);
    let mut keys = Vec::new();
    for result in reader {
        let record = result.map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        keys.push(record.key());
    }
    tracing::debug!(path = %path.display(), keys = keys.len(), "loaded variant keys");
    Ok(keys)
}

/// Collect every data record of a (possibly compressed) call file in input
/// order.
pub fn load_records(path: &Path) -> Result<LoadedRecords, LoadError> {
    let mut reader = Reader::new(open(path)?);
    let mut records = Vec::new();
    for result in reader.by_ref() {
        records.push(result.map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "loaded records");
    Ok(LoadedRecords {
        column_header: reader.column_header.take(),
        records,
    })
}

fn open(path: &Path) -> Result<Box<dyn BufRead + Send>, LoadError> {
    open_input(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })
}
