use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use idtech3_bsp::record::{LIGHTMAP_HEIGHT, LIGHTMAP_WIDTH};

use crate::codec::LittleEndianRecord;

pub const TGA_FOOTER: &[u8; 18] = b"TRUEVISION-XFILE.\0";

const UNCOMPRESSED_TRUE_COLOR: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub color_map_origin: u16,
    pub color_map_length: u16,
    pub color_map_depth: u8,
    pub x_origin: u16,
    pub y_origin: u16,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    pub descriptor: u8,
}

impl TgaHeader {
    /// Header for an uncompressed 24-bit lightmap image.
    pub fn lightmap() -> Self {
        Self {
            id_length: 0,
            color_map_type: 0,
            image_type: UNCOMPRESSED_TRUE_COLOR,
            color_map_origin: 0,
            color_map_length: 0,
            color_map_depth: 0,
            x_origin: 0,
            y_origin: 0,
            width: LIGHTMAP_WIDTH as u16,
            height: LIGHTMAP_HEIGHT as u16,
            bits_per_pixel: 24,
            descriptor: 0,
        }
    }
}

impl LittleEndianRecord for TgaHeader {
    const SIZE: usize = 18;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            id_length: r.read_u8()?,
            color_map_type: r.read_u8()?,
            image_type: r.read_u8()?,
            color_map_origin: r.read_u16::<LittleEndian>()?,
            color_map_length: r.read_u16::<LittleEndian>()?,
            color_map_depth: r.read_u8()?,
            x_origin: r.read_u16::<LittleEndian>()?,
            y_origin: r.read_u16::<LittleEndian>()?,
            width: r.read_u16::<LittleEndian>()?,
            height: r.read_u16::<LittleEndian>()?,
            bits_per_pixel: r.read_u8()?,
            descriptor: r.read_u8()?,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.id_length)?;
        w.write_u8(self.color_map_type)?;
        w.write_u8(self.image_type)?;
        w.write_u16::<LittleEndian>(self.color_map_origin)?;
        w.write_u16::<LittleEndian>(self.color_map_length)?;
        w.write_u8(self.color_map_depth)?;
        w.write_u16::<LittleEndian>(self.x_origin)?;
        w.write_u16::<LittleEndian>(self.y_origin)?;
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u8(self.bits_per_pixel)?;
        w.write_u8(self.descriptor)?;
        Ok(())
    }
}

/// Streams a lightmap as a TGA image: header, pixels bottom row first in BGR order, footer.
///
/// `pixels` holds the lightmap exactly as stored in the BSP: rows top to bottom, RGB.
pub fn write_lightmap_tga_to<W: Write>(w: &mut W, pixels: &[u8]) -> io::Result<()> {
    let texels: &[[u8; 3]] = bytemuck::try_cast_slice(pixels).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("lightmap pixels: {:?}", e))
    })?;
    if texels.len() != LIGHTMAP_WIDTH * LIGHTMAP_HEIGHT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("lightmap has {} texels", texels.len()),
        ));
    }

    TgaHeader::lightmap().write_to(w)?;
    for row in texels.chunks_exact(LIGHTMAP_WIDTH).rev() {
        for &[r, g, b] in row {
            w.write_all(&[b, g, r])?;
        }
    }
    w.write_all(TGA_FOOTER)?;
    Ok(())
}

pub fn write_lightmap_tga(path: &Path, pixels: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_lightmap_tga_to(&mut w, pixels)
        .with_context(|| format!("Writing {}", path.display()))?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXELS: usize = LIGHTMAP_WIDTH * LIGHTMAP_HEIGHT;

    #[test]
    fn header_bytes() {
        assert_eq!(
            TgaHeader::lightmap().encode().unwrap(),
            [0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 128, 0, 128, 0, 24, 0],
        );
    }

    #[test]
    fn header_round_trip() {
        let header = TgaHeader::lightmap();
        assert_eq!(TgaHeader::decode(&header.encode().unwrap()).unwrap(), header);
        assert!(TgaHeader::decode(&[0; 17]).is_err());
    }

    #[test]
    fn pixels_flip_and_swizzle() {
        let mut pixels = vec![0u8; PIXELS * 3];
        // Top-left texel.
        pixels[0..3].copy_from_slice(&[1, 2, 3]);
        // Bottom-left texel.
        let bottom_left = (LIGHTMAP_HEIGHT - 1) * LIGHTMAP_WIDTH * 3;
        pixels[bottom_left..bottom_left + 3].copy_from_slice(&[4, 5, 6]);
        // Bottom-right texel.
        pixels[PIXELS * 3 - 3..].copy_from_slice(&[7, 8, 9]);

        let mut out = Vec::new();
        write_lightmap_tga_to(&mut out, &pixels).unwrap();

        assert_eq!(out.len(), 18 + PIXELS * 3 + 18);
        let body = &out[18..18 + PIXELS * 3];
        assert_eq!(&body[0..3], &[6, 5, 4]);
        assert_eq!(&body[(LIGHTMAP_WIDTH - 1) * 3..LIGHTMAP_WIDTH * 3], &[9, 8, 7]);
        assert_eq!(&body[PIXELS * 3 - LIGHTMAP_WIDTH * 3..][..3], &[3, 2, 1]);
        assert_eq!(&out[out.len() - 18..], TGA_FOOTER);
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(write_lightmap_tga_to(&mut Vec::new(), &[0; 30]).is_err());
        assert!(write_lightmap_tga_to(&mut Vec::new(), &[0; 31]).is_err());
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dm_0000.tga");
        write_lightmap_tga(&path, &vec![0x40; PIXELS * 3]).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 18 + PIXELS * 3 + 18);
        assert_eq!(TgaHeader::decode(&data[..18]).unwrap(), TgaHeader::lightmap());
    }
}
