use std::fs::File;
use std::io::{BufReader, BufWriter, Error as IoError, Read, Write};
use std::path::Path;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::bytecode::MachineKind;

const MAGIC: u32 = 0x5253564D; // "RSVM" in ASCII
const VERSION: u8 = 1;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),

    #[error("Invalid image format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported image version: {0}")]
    UnsupportedVersion(u8),
}

/// A program together with the machine it targets, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub name: String,
    pub kind: MachineKind,
    pub code: Vec<u8>,
}

impl ProgramImage {
    pub fn new(name: &str, kind: MachineKind, code: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            code,
        }
    }

    /// Parse an image from a reader (file, memory buffer, etc.)
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ImageError> {
        let magic = reader.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(ImageError::InvalidFormat("Invalid magic number".to_string()));
        }

        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let kind_byte = reader.read_u8()?;
        let kind = MachineKind::from_byte(kind_byte)
            .ok_or_else(|| ImageError::InvalidFormat(format!("Unknown machine kind: {}", kind_byte)))?;

        let name_len = reader.read_u32::<BigEndian>()? as usize;
        let mut name_bytes = vec![0u8; name_len];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| ImageError::InvalidFormat("Program name is not UTF-8".to_string()))?;

        let code_len = reader.read_u32::<BigEndian>()? as usize;
        let mut code = vec![0u8; code_len];
        reader.read_exact(&mut code)?;

        Ok(Self { name, kind, code })
    }

    /// Serialize the image to a writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), ImageError> {
        writer.write_u32::<BigEndian>(MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(self.kind.to_byte())?;

        writer.write_u32::<BigEndian>(self.name.len() as u32)?;
        writer.write_all(self.name.as_bytes())?;

        writer.write_u32::<BigEndian>(self.code.len() as u32)?;
        writer.write_all(&self.code)?;
        Ok(())
    }

    /// Read an image file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Write an image file, replacing any existing one
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
