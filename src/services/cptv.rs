//! Reader for the CPTV thermal recording container.
//!
//! Only what the metadata stage needs is decoded: the header fields and the
//! framing of each frame section. Frame pixel data is skipped, never
//! decompressed.

use std::io::{self, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;

const MAGIC: &[u8; 4] = b"CPTV";
const SUPPORTED_VERSIONS: &[u8] = &[1, 2];

const HEADER_SECTION: u8 = b'H';
const FRAME_SECTION: u8 = b'F';

const FIELD_TIMESTAMP: u8 = b'T';
const FIELD_X_RESOLUTION: u8 = b'X';
const FIELD_Y_RESOLUTION: u8 = b'Y';
const FIELD_DEVICE_NAME: u8 = b'D';
const FIELD_PREVIEW_SECS: u8 = b'P';

const FIELD_FRAME_SIZE: u8 = b'f';
const FIELD_TIME_ON: u8 = b't';
const FIELD_BIT_WIDTH: u8 = b'b';

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error reading recording: {0}")]
    Io(#[from] io::Error),

    #[error("not a CPTV file (bad magic)")]
    BadMagic,

    #[error("unsupported CPTV version {0}")]
    UnsupportedVersion(u8),

    #[error("expected section '{expected}', found '{found}'")]
    UnexpectedSection { expected: char, found: char },

    #[error("missing required field '{0}'")]
    MissingField(char),

    #[error("field '{code}' has invalid length {len}")]
    InvalidField { code: char, len: u8 },

    #[error("timestamp {0}us is out of range")]
    InvalidTimestamp(u64),

    #[error("recording is truncated")]
    Truncated,
}

/// Header values of a CPTV recording.
#[derive(Debug, Clone, PartialEq)]
pub struct CptvHeader {
    pub version: u8,
    pub timestamp: DateTime<Utc>,
    pub x_resolution: Option<u32>,
    pub y_resolution: Option<u32>,
    pub device_name: Option<String>,
    pub preview_secs: Option<u32>,
}

/// Framing information of one frame section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub size: u32,
    pub time_on_ms: Option<u32>,
    pub bit_width: Option<u8>,
}

pub struct CptvReader<R: Read> {
    inner: GzDecoder<R>,
    header: CptvHeader,
    finished: bool,
}

impl<R: Read> CptvReader<R> {
    /// Open a gzip-compressed CPTV stream and decode its header.
    pub fn new(reader: R) -> Result<Self, DecodeError> {
        let mut inner = GzDecoder::new(reader);

        let mut magic = [0u8; 4];
        read_exact(&mut inner, &mut magic)?;
        if &magic != MAGIC {
            return Err(DecodeError::BadMagic);
        }

        let version = read_u8(&mut inner)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let section = read_u8(&mut inner)?;
        if section != HEADER_SECTION {
            return Err(DecodeError::UnexpectedSection {
                expected: HEADER_SECTION as char,
                found: section as char,
            });
        }

        let header = read_header(&mut inner, version)?;
        Ok(Self {
            inner,
            header,
            finished: false,
        })
    }

    pub fn header(&self) -> &CptvHeader {
        &self.header
    }

    /// Advance past the next frame, returning its framing info.
    ///
    /// Returns `Ok(None)` once the stream ends cleanly on a section boundary.
    pub fn next_frame(&mut self) -> Result<Option<FrameInfo>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        let section = match read_section_type(&mut self.inner)? {
            Some(section) => section,
            None => {
                self.finished = true;
                return Ok(None);
            }
        };
        if section != FRAME_SECTION {
            return Err(DecodeError::UnexpectedSection {
                expected: FRAME_SECTION as char,
                found: section as char,
            });
        }

        let mut size = None;
        let mut time_on_ms = None;
        let mut bit_width = None;
        for (code, data) in read_fields(&mut self.inner)? {
            match code {
                FIELD_FRAME_SIZE => size = Some(uint_field(code, &data)? as u32),
                FIELD_TIME_ON => time_on_ms = Some(uint_field(code, &data)? as u32),
                FIELD_BIT_WIDTH => bit_width = Some(uint_field(code, &data)? as u8),
                _ => {}
            }
        }
        let size = size.ok_or(DecodeError::MissingField(FIELD_FRAME_SIZE as char))?;

        let skipped = io::copy(&mut (&mut self.inner).take(u64::from(size)), &mut io::sink())?;
        if skipped != u64::from(size) {
            return Err(DecodeError::Truncated);
        }

        Ok(Some(FrameInfo {
            size,
            time_on_ms,
            bit_width,
        }))
    }
}

impl<R: Read> Iterator for CptvReader<R> {
    type Item = Result<FrameInfo, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn read_header<R: Read>(inner: &mut R, version: u8) -> Result<CptvHeader, DecodeError> {
    let mut timestamp = None;
    let mut x_resolution = None;
    let mut y_resolution = None;
    let mut device_name = None;
    let mut preview_secs = None;

    for (code, data) in read_fields(inner)? {
        match code {
            FIELD_TIMESTAMP => {
                if data.len() != 8 {
                    return Err(DecodeError::InvalidField {
                        code: code as char,
                        len: data.len() as u8,
                    });
                }
                let micros = LittleEndian::read_u64(&data);
                let parsed = i64::try_from(micros)
                    .ok()
                    .and_then(DateTime::from_timestamp_micros)
                    .ok_or(DecodeError::InvalidTimestamp(micros))?;
                timestamp = Some(parsed);
            }
            FIELD_X_RESOLUTION => x_resolution = Some(uint_field(code, &data)? as u32),
            FIELD_Y_RESOLUTION => y_resolution = Some(uint_field(code, &data)? as u32),
            FIELD_DEVICE_NAME => device_name = Some(String::from_utf8_lossy(&data).into_owned()),
            FIELD_PREVIEW_SECS => preview_secs = Some(uint_field(code, &data)? as u32),
            _ => {}
        }
    }

    Ok(CptvHeader {
        version,
        timestamp: timestamp.ok_or(DecodeError::MissingField(FIELD_TIMESTAMP as char))?,
        x_resolution,
        y_resolution,
        device_name,
        preview_secs,
    })
}

/// Fields are `[len][code][payload]`, preceded by a u8 field count.
fn read_fields<R: Read>(inner: &mut R) -> Result<Vec<(u8, Vec<u8>)>, DecodeError> {
    let count = read_u8(inner)?;
    let mut fields = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let len = read_u8(inner)?;
        let code = read_u8(inner)?;
        let mut data = vec![0u8; usize::from(len)];
        read_exact(inner, &mut data)?;
        fields.push((code, data));
    }
    Ok(fields)
}

fn uint_field(code: u8, data: &[u8]) -> Result<u64, DecodeError> {
    match data.len() {
        1 | 2 | 4 | 8 => Ok(LittleEndian::read_uint(data, data.len())),
        len => Err(DecodeError::InvalidField {
            code: code as char,
            len: len as u8,
        }),
    }
}

fn read_section_type<R: Read>(inner: &mut R) -> Result<Option<u8>, DecodeError> {
    let mut byte = [0u8; 1];
    loop {
        match inner.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_u8<R: Read>(inner: &mut R) -> Result<u8, DecodeError> {
    inner.read_u8().map_err(truncation)
}

fn read_exact<R: Read>(inner: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    inner.read_exact(buf).map_err(truncation)
}

fn truncation(e: io::Error) -> DecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::Truncated
    } else {
        DecodeError::Io(e)
    }
}
