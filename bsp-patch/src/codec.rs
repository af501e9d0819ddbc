use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// A fixed-size record with a little-endian on-disk encoding.
pub trait LittleEndianRecord: Sized {
    const SIZE: usize;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn decode(mut bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {} bytes, got {}", Self::SIZE, bytes.len()),
            ));
        }
        Self::read_from(&mut bytes)
    }

    fn encode(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut out)?;
        Ok(out)
    }
}

pub fn read_f32s<R: Read, const N: usize>(r: &mut R) -> io::Result<[f32; N]> {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        *value = r.read_f32::<LittleEndian>()?;
    }
    Ok(values)
}

pub fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    for &value in values {
        w.write_f32::<LittleEndian>(value)?;
    }
    Ok(())
}
