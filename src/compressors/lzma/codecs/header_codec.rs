use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{LzmaError, Result};

pub const LC_MAX: u32 = 8;
pub const LP_MAX: u32 = 4;
pub const PB_MAX: u32 = 4;

pub const PROPERTIES_SIZE: usize = 5;
pub const HEADER_SIZE: usize = PROPERTIES_SIZE + 8;

/// Size field value for streams terminated by the end marker.
const UNKNOWN_SIZE: u64 = u64::MAX;

/// The literal, position and dictionary parameters shared by the encoder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LzmaProperties {
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    pub dict_size: u32,
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self {
            lc: 3,
            lp: 0,
            pb: 2,
            dict_size: 1 << 23,
        }
    }
}

impl LzmaProperties {
    pub fn new(lc: u32, lp: u32, pb: u32, dict_size: u32) -> Result<Self> {
        let props = Self {
            lc,
            lp,
            pb,
            dict_size,
        };
        props.validate()?;
        Ok(props)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lc > LC_MAX {
            return Err(LzmaError::out_of_range("lc", self.lc.into(), 0, LC_MAX.into()));
        }
        if self.lp > LP_MAX {
            return Err(LzmaError::out_of_range("lp", self.lp.into(), 0, LP_MAX.into()));
        }
        if self.pb > PB_MAX {
            return Err(LzmaError::out_of_range("pb", self.pb.into(), 0, PB_MAX.into()));
        }
        Ok(())
    }

    /// The packed `(pb * 5 + lp) * 9 + lc` byte.
    pub fn props_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    pub fn to_bytes(&self) -> [u8; PROPERTIES_SIZE] {
        let mut bytes = [0u8; PROPERTIES_SIZE];
        bytes[0] = self.props_byte();
        LittleEndian::write_u32(&mut bytes[1..], self.dict_size);
        bytes
    }

    /// Parse the 5 properties bytes. Extra trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PROPERTIES_SIZE {
            return Err(LzmaError::MalformedHeader(format!(
                "expected {} properties bytes, got {}",
                PROPERTIES_SIZE,
                bytes.len()
            )));
        }

        let props = bytes[0] as u32;
        let lc = props % 9;
        let rest = props / 9;
        let lp = rest % 5;
        let pb = rest / 5;
        if pb > PB_MAX {
            return Err(LzmaError::MalformedHeader(format!(
                "invalid properties byte {:#04x}",
                bytes[0]
            )));
        }

        Ok(Self {
            lc,
            lp,
            pb,
            dict_size: LittleEndian::read_u32(&bytes[1..PROPERTIES_SIZE]),
        })
    }
}

/// The 13 byte `.lzma` file header: properties followed by the uncompressed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaHeader {
    pub properties: LzmaProperties,
    /// `None` when the stream ends with an end marker instead.
    pub uncompressed_size: Option<u64>,
}

impl LzmaHeader {
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.properties.to_bytes())?;
        writer.write_u64::<LittleEndian>(self.uncompressed_size.unwrap_or(UNKNOWN_SIZE))?;
        Ok(())
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut props = [0u8; PROPERTIES_SIZE];
        reader.read_exact(&mut props).map_err(short_header)?;
        let properties = LzmaProperties::from_bytes(&props)?;

        let size = reader.read_u64::<LittleEndian>().map_err(short_header)?;
        let uncompressed_size = (size != UNKNOWN_SIZE).then_some(size);

        Ok(Self {
            properties,
            uncompressed_size,
        })
    }
}

fn short_header(err: io::Error) -> LzmaError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LzmaError::MalformedHeader("input .lzma is too short".into())
    } else {
        LzmaError::Io(err)
    }
}
