/// Binary NBT, as written by FTB Quests before it switched to SNBT
///
/// Big-endian, one named root compound, optionally gzipped. Strings are
/// Java "modified UTF-8": NUL is `C0 80` and characters outside the BMP are
/// written as two 3-byte surrogates.
use super::FormatError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use indexmap::IndexMap;
use std::io::{Cursor, Read, Write};

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum NbtTag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(NbtList),
    Compound(IndexMap<String, NbtTag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

/// Element type is stored even for empty lists so they write back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct NbtList {
    pub element_id: u8,
    pub items: Vec<NbtTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NbtDocument {
    pub name: String,
    pub root: IndexMap<String, NbtTag>,
    pub compression: Compression,
}

impl NbtTag {
    pub fn id(&self) -> u8 {
        match self {
            NbtTag::Byte(_) => TAG_BYTE,
            NbtTag::Short(_) => TAG_SHORT,
            NbtTag::Int(_) => TAG_INT,
            NbtTag::Long(_) => TAG_LONG,
            NbtTag::Float(_) => TAG_FLOAT,
            NbtTag::Double(_) => TAG_DOUBLE,
            NbtTag::ByteArray(_) => TAG_BYTE_ARRAY,
            NbtTag::String(_) => TAG_STRING,
            NbtTag::List(_) => TAG_LIST,
            NbtTag::Compound(_) => TAG_COMPOUND,
            NbtTag::IntArray(_) => TAG_INT_ARRAY,
            NbtTag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NbtTag::String(text) => Some(text),
            _ => None,
        }
    }
}

fn malformed(message: impl Into<String>) -> FormatError {
    FormatError::ParseError(format!("NBT {}", message.into()))
}

fn truncated(err: std::io::Error) -> FormatError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        malformed("data ends early")
    } else {
        FormatError::IoError(err)
    }
}

/// Decode a document, gunzipping first when the gzip magic is present.
pub fn read(bytes: &[u8]) -> Result<NbtDocument, FormatError> {
    let (raw, compression) = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut raw = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut raw)
            .map_err(|e| malformed(format!("gzip stream is invalid: {}", e)))?;
        (raw, Compression::Gzip)
    } else {
        (bytes.to_vec(), Compression::None)
    };

    let mut reader = Cursor::new(raw.as_slice());
    let id = reader.read_u8().map_err(truncated)?;
    if id != TAG_COMPOUND {
        return Err(malformed(format!("root tag must be a compound, found id {}", id)));
    }
    let name = read_string(&mut reader)?;
    let root = read_compound(&mut reader, 0)?;
    if (reader.position() as usize) != raw.len() {
        log::warn!(
            "NBT document has {} trailing bytes, ignored",
            raw.len() - reader.position() as usize
        );
    }
    Ok(NbtDocument {
        name,
        root,
        compression,
    })
}

/// Encode a document with the compression it was read with.
pub fn write(document: &NbtDocument) -> Result<Vec<u8>, FormatError> {
    let mut raw = Vec::new();
    raw.write_u8(TAG_COMPOUND)?;
    write_string(&mut raw, &document.name)?;
    write_compound(&mut raw, &document.root)?;

    match document.compression {
        Compression::None => Ok(raw),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
            encoder.write_all(&raw)?;
            Ok(encoder.finish()?)
        }
    }
}

fn read_compound<R: Read>(
    reader: &mut R,
    depth: usize,
) -> Result<IndexMap<String, NbtTag>, FormatError> {
    if depth > MAX_DEPTH {
        return Err(malformed("nesting too deep"));
    }
    let mut map = IndexMap::new();
    loop {
        let id = reader.read_u8().map_err(truncated)?;
        if id == TAG_END {
            return Ok(map);
        }
        let name = read_string(reader)?;
        let tag = read_payload(reader, id, depth + 1)?;
        map.insert(name, tag);
    }
}

fn read_length<R: Read>(reader: &mut R) -> Result<usize, FormatError> {
    let length = reader.read_i32::<BigEndian>().map_err(truncated)?;
    usize::try_from(length).map_err(|_| malformed(format!("negative length {}", length)))
}

fn read_payload<R: Read>(reader: &mut R, id: u8, depth: usize) -> Result<NbtTag, FormatError> {
    if depth > MAX_DEPTH {
        return Err(malformed("nesting too deep"));
    }
    let tag = match id {
        TAG_BYTE => NbtTag::Byte(reader.read_i8().map_err(truncated)?),
        TAG_SHORT => NbtTag::Short(reader.read_i16::<BigEndian>().map_err(truncated)?),
        TAG_INT => NbtTag::Int(reader.read_i32::<BigEndian>().map_err(truncated)?),
        TAG_LONG => NbtTag::Long(reader.read_i64::<BigEndian>().map_err(truncated)?),
        TAG_FLOAT => NbtTag::Float(reader.read_f32::<BigEndian>().map_err(truncated)?),
        TAG_DOUBLE => NbtTag::Double(reader.read_f64::<BigEndian>().map_err(truncated)?),
        TAG_BYTE_ARRAY => {
            let length = read_length(reader)?;
            let mut items = Vec::with_capacity(length.min(1 << 16));
            for _ in 0..length {
                items.push(reader.read_i8().map_err(truncated)?);
            }
            NbtTag::ByteArray(items)
        }
        TAG_STRING => NbtTag::String(read_string(reader)?),
        TAG_LIST => {
            let element_id = reader.read_u8().map_err(truncated)?;
            let length = read_length(reader)?;
            if element_id == TAG_END && length > 0 {
                return Err(malformed("non-empty list of end tags"));
            }
            let mut items = Vec::with_capacity(length.min(1 << 16));
            for _ in 0..length {
                items.push(read_payload(reader, element_id, depth + 1)?);
            }
            NbtTag::List(NbtList { element_id, items })
        }
        TAG_COMPOUND => NbtTag::Compound(read_compound(reader, depth)?),
        TAG_INT_ARRAY => {
            let length = read_length(reader)?;
            let mut items = Vec::with_capacity(length.min(1 << 16));
            for _ in 0..length {
                items.push(reader.read_i32::<BigEndian>().map_err(truncated)?);
            }
            NbtTag::IntArray(items)
        }
        TAG_LONG_ARRAY => {
            let length = read_length(reader)?;
            let mut items = Vec::with_capacity(length.min(1 << 16));
            for _ in 0..length {
                items.push(reader.read_i64::<BigEndian>().map_err(truncated)?);
            }
            NbtTag::LongArray(items)
        }
        other => return Err(malformed(format!("unknown tag id {}", other))),
    };
    Ok(tag)
}

fn write_compound<W: Write>(
    writer: &mut W,
    map: &IndexMap<String, NbtTag>,
) -> Result<(), FormatError> {
    for (name, tag) in map {
        writer.write_u8(tag.id())?;
        write_string(writer, name)?;
        write_payload(writer, tag)?;
    }
    writer.write_u8(TAG_END)?;
    Ok(())
}

fn write_length<W: Write>(writer: &mut W, length: usize) -> Result<(), FormatError> {
    let length = i32::try_from(length).map_err(|_| {
        FormatError::SerializationError(format!("{} elements do not fit in an NBT array", length))
    })?;
    writer.write_i32::<BigEndian>(length)?;
    Ok(())
}

fn write_payload<W: Write>(writer: &mut W, tag: &NbtTag) -> Result<(), FormatError> {
    match tag {
        NbtTag::Byte(value) => writer.write_i8(*value)?,
        NbtTag::Short(value) => writer.write_i16::<BigEndian>(*value)?,
        NbtTag::Int(value) => writer.write_i32::<BigEndian>(*value)?,
        NbtTag::Long(value) => writer.write_i64::<BigEndian>(*value)?,
        NbtTag::Float(value) => writer.write_f32::<BigEndian>(*value)?,
        NbtTag::Double(value) => writer.write_f64::<BigEndian>(*value)?,
        NbtTag::ByteArray(items) => {
            write_length(writer, items.len())?;
            for item in items {
                writer.write_i8(*item)?;
            }
        }
        NbtTag::String(text) => write_string(writer, text)?,
        NbtTag::List(list) => {
            writer.write_u8(list.element_id)?;
            write_length(writer, list.items.len())?;
            for item in &list.items {
                if item.id() != list.element_id {
                    return Err(FormatError::SerializationError(format!(
                        "list of tag id {} holds a tag of id {}",
                        list.element_id,
                        item.id()
                    )));
                }
                write_payload(writer, item)?;
            }
        }
        NbtTag::Compound(map) => write_compound(writer, map)?,
        NbtTag::IntArray(items) => {
            write_length(writer, items.len())?;
            for item in items {
                writer.write_i32::<BigEndian>(*item)?;
            }
        }
        NbtTag::LongArray(items) => {
            write_length(writer, items.len())?;
            for item in items {
                writer.write_i64::<BigEndian>(*item)?;
            }
        }
    }
    Ok(())
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, FormatError> {
    let length = reader.read_u16::<BigEndian>().map_err(truncated)? as usize;
    let mut buf = vec![0u8; length];
    reader.read_exact(&mut buf).map_err(truncated)?;
    decode_modified_utf8(&buf)
}

fn write_string<W: Write>(writer: &mut W, text: &str) -> Result<(), FormatError> {
    let encoded = encode_modified_utf8(text);
    let length = u16::try_from(encoded.len()).map_err(|_| {
        FormatError::SerializationError(format!(
            "string of {} bytes is too long for NBT",
            encoded.len()
        ))
    })?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(&encoded)?;
    Ok(())
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String, FormatError> {
    // Plain UTF-8 is the common case; only NUL and non-BMP text differ.
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let b0 = bytes[index] as u16;
        let continuation = |offset: usize| -> Result<u16, FormatError> {
            match bytes.get(index + offset) {
                Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
                _ => Err(malformed("string is not valid modified UTF-8")),
            }
        };
        if b0 & 0x80 == 0 {
            units.push(b0);
            index += 1;
        } else if b0 & 0xE0 == 0xC0 {
            units.push(((b0 & 0x1F) << 6) | continuation(1)?);
            index += 2;
        } else if b0 & 0xF0 == 0xE0 {
            units.push(((b0 & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
            index += 3;
        } else {
            return Err(malformed("string is not valid modified UTF-8"));
        }
    }
    String::from_utf16(&units).map_err(|_| malformed("string holds an unpaired surrogate"))
}

fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c as u32 {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x1_0000..=u32::MAX => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let unit = *unit;
                    out.push(0xE0 | (unit >> 12) as u8);
                    out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                    out.push(0x80 | (unit & 0x3F) as u8);
                }
            }
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}
