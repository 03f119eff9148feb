//! Little-endian primitive readers and writers for binary scene streams.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3, Vec4};

use crate::error::{SceneError, SchemaError, TruncatedStreamError};

type ReadResult<T> = Result<T, TruncatedStreamError>;

// ---------------------------------------------------------------------------
// BinaryReader
// ---------------------------------------------------------------------------

/// Cursor over an in-memory binary scene.
///
/// Every read that runs past the end reports the offset it started at and
/// what it was trying to read.
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    /// Bytes between `start` and the current position.
    pub fn span_from(&self, start: u64) -> &'a [u8] {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        let end = self.cursor.position() as usize;
        &bytes[start as usize..end]
    }

    fn truncated(&self, reading: &'static str) -> TruncatedStreamError {
        TruncatedStreamError {
            offset: self.cursor.position(),
            reading,
        }
    }

    fn read_with<T>(
        &mut self,
        reading: &'static str,
        f: impl FnOnce(&mut Cursor<&'a [u8]>) -> std::io::Result<T>,
    ) -> ReadResult<T> {
        let start = self.cursor.position();
        f(&mut self.cursor).map_err(|_| {
            self.cursor.set_position(start);
            self.truncated(reading)
        })
    }

    pub fn u8(&mut self, reading: &'static str) -> ReadResult<u8> {
        self.read_with(reading, |c| c.read_u8())
    }

    pub fn u16(&mut self, reading: &'static str) -> ReadResult<u16> {
        self.read_with(reading, |c| c.read_u16::<LittleEndian>())
    }

    pub fn u32(&mut self, reading: &'static str) -> ReadResult<u32> {
        self.read_with(reading, |c| c.read_u32::<LittleEndian>())
    }

    pub fn i32(&mut self, reading: &'static str) -> ReadResult<i32> {
        self.read_with(reading, |c| c.read_i32::<LittleEndian>())
    }

    pub fn f32(&mut self, reading: &'static str) -> ReadResult<f32> {
        self.read_with(reading, |c| c.read_f32::<LittleEndian>())
    }

    pub fn bool(&mut self, reading: &'static str) -> ReadResult<bool> {
        Ok(self.u8(reading)? != 0)
    }

    pub fn vec3(&mut self, reading: &'static str) -> ReadResult<Vec3> {
        Ok(Vec3::new(self.f32(reading)?, self.f32(reading)?, self.f32(reading)?))
    }

    pub fn vec4(&mut self, reading: &'static str) -> ReadResult<Vec4> {
        Ok(Vec4::new(
            self.f32(reading)?,
            self.f32(reading)?,
            self.f32(reading)?,
            self.f32(reading)?,
        ))
    }

    /// Quaternion stored as `x, y, z, w`.
    pub fn quat(&mut self, reading: &'static str) -> ReadResult<Quat> {
        Ok(Quat::from_xyzw(
            self.f32(reading)?,
            self.f32(reading)?,
            self.f32(reading)?,
            self.f32(reading)?,
        ))
    }

    pub fn bytes(&mut self, len: usize, reading: &'static str) -> ReadResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.truncated(reading));
        }
        let start = self.cursor.position() as usize;
        self.cursor.set_position((start + len) as u64);
        let bytes: &'a [u8] = *self.cursor.get_ref();
        Ok(&bytes[start..start + len])
    }

    fn string_of_len(&mut self, len: usize, reading: &'static str) -> Result<String, SceneError> {
        let raw = self.bytes(len, reading)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| SchemaError::invalid(reading, e.to_string()).into())
    }

    /// String with a u16 length prefix.
    pub fn string_u16(&mut self, reading: &'static str) -> Result<String, SceneError> {
        let len = self.u16(reading)? as usize;
        self.string_of_len(len, reading)
    }

    /// String with a u32 length prefix.
    pub fn string_u32(&mut self, reading: &'static str) -> Result<String, SceneError> {
        let len = self.u32(reading)? as usize;
        self.string_of_len(len, reading)
    }

    /// String with an i32 length prefix (legacy ESCN). Negative lengths are
    /// a schema error.
    pub fn string_i32(&mut self, reading: &'static str) -> Result<String, SceneError> {
        let len = self.i32(reading)?;
        let len = usize::try_from(len)
            .map_err(|_| SchemaError::invalid(reading, format!("negative length {len}")))?;
        self.string_of_len(len, reading)
    }
}

// ---------------------------------------------------------------------------
// BinaryWriter
// ---------------------------------------------------------------------------

/// Growable little-endian output buffer.
///
/// Writes into a `Vec<u8>` cannot fail, so the `byteorder` results are
/// discarded.
#[derive(Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        let _ = self.buf.write_u16::<LittleEndian>(v);
    }

    pub fn u32(&mut self, v: u32) {
        let _ = self.buf.write_u32::<LittleEndian>(v);
    }

    pub fn i32(&mut self, v: i32) {
        let _ = self.buf.write_i32::<LittleEndian>(v);
    }

    pub fn f32(&mut self, v: f32) {
        let _ = self.buf.write_f32::<LittleEndian>(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    pub fn vec3(&mut self, v: Vec3) {
        for c in v.to_array() {
            self.f32(c);
        }
    }

    pub fn vec4(&mut self, v: Vec4) {
        for c in v.to_array() {
            self.f32(c);
        }
    }

    pub fn quat(&mut self, q: Quat) {
        for c in q.to_array() {
            self.f32(c);
        }
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Longer strings are cut at the last character boundary that fits.
    pub fn string_u16(&mut self, s: &str) {
        let mut len = s.len().min(u16::MAX as usize);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        self.u16(len as u16);
        self.bytes(&s.as_bytes()[..len]);
    }

    pub fn string_u32(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }

    pub fn string_i32(&mut self, s: &str) {
        self.i32(s.len() as i32);
        self.bytes(s.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        let mut w = BinaryWriter::new();
        w.u32(0x0403_0201);
        w.u16(0x0605);
        w.i32(-1);
        assert_eq!(w.as_bytes(), &[1, 2, 3, 4, 5, 6, 0xff, 0xff, 0xff, 0xff]);

        let bytes = w.into_bytes();
        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.u32("a").unwrap(), 0x0403_0201);
        assert_eq!(r.u16("b").unwrap(), 0x0605);
        assert_eq!(r.i32("c").unwrap(), -1);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn eof_reports_offset_and_field() {
        let bytes = [1u8, 2, 3];
        let mut r = BinaryReader::new(&bytes);
        r.u8("lead").unwrap();
        let err = r.u32("entity count").unwrap_err();
        assert_eq!(err.offset, 1);
        assert_eq!(err.reading, "entity count");
        // Failed reads do not advance
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn strings_with_each_prefix() {
        let mut w = BinaryWriter::new();
        w.string_u16("lamp");
        w.string_u32("crate");
        w.string_i32("door");
        let bytes = w.into_bytes();

        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.string_u16("a").unwrap(), "lamp");
        assert_eq!(r.string_u32("b").unwrap(), "crate");
        assert_eq!(r.string_i32("c").unwrap(), "door");
    }

    #[test]
    fn short_prefix_cuts_on_char_boundary() {
        // 'é' is two bytes, so the 65535 byte limit falls inside the last one
        let long = "é".repeat(40_000);
        let mut w = BinaryWriter::new();
        w.string_u16(&long);
        let bytes = w.into_bytes();

        let mut r = BinaryReader::new(&bytes);
        let read = r.string_u16("name").unwrap();
        assert_eq!(read.len(), 65_534);
        assert!(long.starts_with(&read));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn string_longer_than_stream_is_truncated() {
        let mut w = BinaryWriter::new();
        w.u32(100);
        w.bytes(b"abc");
        let bytes = w.into_bytes();
        let mut r = BinaryReader::new(&bytes);
        assert!(matches!(r.string_u32("name"), Err(SceneError::Truncated(_))));
    }

    #[test]
    fn negative_legacy_length_is_schema_error() {
        let mut w = BinaryWriter::new();
        w.i32(-4);
        let bytes = w.into_bytes();
        let mut r = BinaryReader::new(&bytes);
        assert!(matches!(r.string_i32("name"), Err(SceneError::Schema(_))));
    }

    #[test]
    fn quat_order_is_xyzw() {
        let mut w = BinaryWriter::new();
        w.quat(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0));
        let bytes = w.into_bytes();
        assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.quat("rotation").unwrap(), Quat::IDENTITY);
    }
}
