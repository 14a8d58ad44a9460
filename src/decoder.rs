//! Decoder for the scanner's multiplexed JSON output.
//!
//! The scanner prints a sequence of pretty-printed JSON objects. Each one
//! opens on a line starting with `{` and closes on a line starting with `}`;
//! nested braces are always indented. Every object carries a single top-level
//! key naming its shape, of which three are understood here:
//!
//! - `config` - scanner and database identity
//! - `SBOM` - the module graph
//! - `osv` - one advisory
//!
//! Anything else (`progress`, `finding`, stray text) is skipped.
//!
//! # Example
//!
//! ```
//! use govuln::decoder::decode;
//!
//! let output = "{\n  \"osv\": {\n    \"id\": \"GO-2024-0001\"\n  }\n}\n";
//! let decoded = decode(output);
//!
//! assert_eq!(decoded.advisories.len(), 1);
//! assert!(decoded.sbom.is_none());
//! ```

use serde::Deserialize;
use tracing::{debug, trace};

use crate::model::{Advisory, Sbom, ScanConfig};

/// Number of characters after the opening brace inspected to pick a shape.
pub const PROBE_LEN: usize = 20;

/// One understood record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Config(ScanConfig),
    Sbom(Sbom),
    Advisory(Advisory),
}

/// Everything extracted from one scanner run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub config: Option<ScanConfig>,
    pub sbom: Option<Sbom>,
    pub advisories: Vec<Advisory>,
}

impl Decoded {
    fn push(&mut self, record: Record) {
        match record {
            Record::Config(config) => self.config = Some(config),
            Record::Sbom(sbom) => self.sbom = Some(sbom),
            Record::Advisory(advisory) => self.advisories.push(advisory),
        }
    }
}

#[derive(Deserialize)]
struct ConfigEnvelope {
    config: ScanConfig,
}

#[derive(Deserialize)]
struct SbomEnvelope {
    #[serde(rename = "SBOM")]
    sbom: Sbom,
}

#[derive(Deserialize)]
struct OsvEnvelope {
    osv: Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Config,
    Sbom,
    Osv,
}

impl Shape {
    fn probe(object: &str) -> Option<Self> {
        let body = object.trim_start().strip_prefix('{')?.trim_start();
        let end = body
            .char_indices()
            .nth(PROBE_LEN)
            .map_or(body.len(), |(idx, _)| idx);
        let head = &body[..end];

        if head.starts_with("\"config\":") {
            Some(Shape::Config)
        } else if head.starts_with("\"SBOM\":") {
            Some(Shape::Sbom)
        } else if head.starts_with("\"osv\":") {
            Some(Shape::Osv)
        } else {
            None
        }
    }
}

/// Decodes a single framed object. Returns `None` for unknown shapes and for
/// objects that claim a known shape but do not parse.
pub fn decode_record(object: &str) -> Option<Record> {
    let shape = Shape::probe(object)?;

    let record = match shape {
        Shape::Config => serde_json::from_str::<ConfigEnvelope>(object).map(|e| Record::Config(e.config)),
        Shape::Sbom => serde_json::from_str::<SbomEnvelope>(object).map(|e| Record::Sbom(e.sbom)),
        Shape::Osv => serde_json::from_str::<OsvEnvelope>(object).map(|e| Record::Advisory(e.osv)),
    };

    match record {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(shape = ?shape, error = %e, "skipping malformed record");
            None
        }
    }
}

/// Splits scanner output into objects and decodes each one.
///
/// Text outside an object, an object left open at the end of the input and
/// unknown records are all ignored. The last `config` and `SBOM` records win
/// if the output repeats them.
pub fn decode(output: &str) -> Decoded {
    let mut decoded = Decoded::default();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if line.starts_with('{') {
            if current.is_some() {
                trace!("discarding unterminated object");
            }
            current = Some(String::from(line));
            continue;
        }

        let Some(buf) = current.as_mut() else {
            continue;
        };
        buf.push('\n');
        buf.push_str(line);

        if line.starts_with('}') {
            if let Some(record) = current.take().as_deref().and_then(decode_record) {
                decoded.push(record);
            }
        }
    }

    if current.is_some() {
        debug!("scanner output ended inside an object");
    }

    decoded
}
