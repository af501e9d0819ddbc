use std::fmt::{self, Debug, Formatter};

use anyhow::{bail, Result};
use byteorder::{ByteOrder, LittleEndian};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I32,
    F32,
}

impl FieldKind {
    pub const fn size(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::I32 | FieldKind::F32 => 4,
        }
    }
}

/// Names of every field that appears in a registered record layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    // shaders
    Name,
    SurfaceFlags,
    ContentFlags,
    Subdivisions,

    // surfaces
    Shader,
    Fog,
    SurfaceType,
    FirstVert,
    NumVerts,
    FirstIndex,
    NumIndexes,
    LightmapStyles,
    VertexStyles,
    LightmapNum,
    LightmapX,
    LightmapY,
    LightmapWidth,
    LightmapHeight,
    LightmapOrigin,
    LightmapVecs,
    PatchWidth,
    PatchHeight,

    // models
    Mins,
    Maxs,
    FirstSurface,
    NumSurfaces,
    FirstBrush,
    NumBrushes,

    // leaf surfaces
    Surface,

    // brush sides
    Plane,
    DrawSurface,

    // lightmaps
    Pixels,

    // entity lights
    Position,
    Color,
    Intensity,
    Style,
    Leaf,
    NeedsTrace,
    SpotLight,
    SpotDir,
    SpotRadiusByDistance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    pub field: Field,
    pub kind: FieldKind,
    pub count: usize,
}

const fn desc(field: Field, kind: FieldKind, count: usize) -> FieldDesc {
    FieldDesc { field, kind, count }
}

impl FieldDesc {
    pub const fn size(&self) -> usize {
        self.kind.size() * self.count
    }
}

/// A fixed-size, packed, little-endian record layout. Field offsets are implied by the order of
/// `fields`.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    pub fields: &'static [FieldDesc],
}

impl RecordLayout {
    pub fn size(&self) -> usize {
        self.fields.iter().map(FieldDesc::size).sum()
    }

    /// Returns the byte offset and descriptor of `field`, or `None` if this layout does not
    /// define it.
    pub fn field(&self, field: Field) -> Option<(usize, &'static FieldDesc)> {
        let mut offset = 0;
        for desc in self.fields {
            if desc.field == field {
                return Some((offset, desc));
            }
            offset += desc.size();
        }
        None
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.field(field).is_some()
    }

    fn locate(&self, field: Field, kind: FieldKind, index: usize) -> Result<usize> {
        let (offset, desc) = match self.field(field) {
            Some(found) => found,
            None => bail!("record layout {} has no field {:?}", self.name, field),
        };
        if desc.kind != kind {
            bail!(
                "field {:?} of {} is {:?}, not {:?}",
                field,
                self.name,
                desc.kind,
                kind,
            );
        }
        if index >= desc.count {
            bail!(
                "element {} out of range for field {:?} of {} (count {})",
                index,
                field,
                self.name,
                desc.count,
            );
        }
        Ok(offset + index * kind.size())
    }
}

use FieldKind::{F32, I32, U8};

pub static Q3_SHADER: RecordLayout = RecordLayout {
    name: "q3 shader",
    fields: &[
        desc(Field::Name, U8, 64),
        desc(Field::SurfaceFlags, I32, 1),
        desc(Field::ContentFlags, I32, 1),
    ],
};

pub static FAKK_SHADER: RecordLayout = RecordLayout {
    name: "fakk shader",
    fields: &[
        desc(Field::Name, U8, 64),
        desc(Field::SurfaceFlags, I32, 1),
        desc(Field::ContentFlags, I32, 1),
        desc(Field::Subdivisions, I32, 1),
    ],
};

pub static LIGHTMAP: RecordLayout = RecordLayout {
    name: "lightmap",
    fields: &[desc(Field::Pixels, U8, LIGHTMAP_WIDTH * LIGHTMAP_HEIGHT * 3)],
};

pub const LIGHTMAP_WIDTH: usize = 128;
pub const LIGHTMAP_HEIGHT: usize = 128;

pub static Q3_SURFACE: RecordLayout = RecordLayout {
    name: "q3 surface",
    fields: &[
        desc(Field::Shader, I32, 1),
        desc(Field::Fog, I32, 1),
        desc(Field::SurfaceType, I32, 1),
        desc(Field::FirstVert, I32, 1),
        desc(Field::NumVerts, I32, 1),
        desc(Field::FirstIndex, I32, 1),
        desc(Field::NumIndexes, I32, 1),
        desc(Field::LightmapNum, I32, 1),
        desc(Field::LightmapX, I32, 1),
        desc(Field::LightmapY, I32, 1),
        desc(Field::LightmapWidth, I32, 1),
        desc(Field::LightmapHeight, I32, 1),
        desc(Field::LightmapOrigin, F32, 3),
        desc(Field::LightmapVecs, F32, 9),
        desc(Field::PatchWidth, I32, 1),
        desc(Field::PatchHeight, I32, 1),
    ],
};

pub static FAKK_SURFACE: RecordLayout = RecordLayout {
    name: "fakk surface",
    fields: &[
        desc(Field::Shader, I32, 1),
        desc(Field::Fog, I32, 1),
        desc(Field::SurfaceType, I32, 1),
        desc(Field::FirstVert, I32, 1),
        desc(Field::NumVerts, I32, 1),
        desc(Field::FirstIndex, I32, 1),
        desc(Field::NumIndexes, I32, 1),
        desc(Field::LightmapNum, I32, 1),
        desc(Field::LightmapX, I32, 1),
        desc(Field::LightmapY, I32, 1),
        desc(Field::LightmapWidth, I32, 1),
        desc(Field::LightmapHeight, I32, 1),
        desc(Field::LightmapOrigin, F32, 3),
        desc(Field::LightmapVecs, F32, 9),
        desc(Field::PatchWidth, I32, 1),
        desc(Field::PatchHeight, I32, 1),
        desc(Field::Subdivisions, F32, 1),
    ],
};

/// Raven surfaces carry four lightmap layers.
pub static RBSP_SURFACE: RecordLayout = RecordLayout {
    name: "rbsp surface",
    fields: &[
        desc(Field::Shader, I32, 1),
        desc(Field::Fog, I32, 1),
        desc(Field::SurfaceType, I32, 1),
        desc(Field::FirstVert, I32, 1),
        desc(Field::NumVerts, I32, 1),
        desc(Field::FirstIndex, I32, 1),
        desc(Field::NumIndexes, I32, 1),
        desc(Field::LightmapStyles, U8, 4),
        desc(Field::VertexStyles, U8, 4),
        desc(Field::LightmapNum, I32, 4),
        desc(Field::LightmapX, I32, 4),
        desc(Field::LightmapY, I32, 4),
        desc(Field::LightmapWidth, I32, 1),
        desc(Field::LightmapHeight, I32, 1),
        desc(Field::LightmapOrigin, F32, 3),
        desc(Field::LightmapVecs, F32, 9),
        desc(Field::PatchWidth, I32, 1),
        desc(Field::PatchHeight, I32, 1),
    ],
};

pub static MODEL: RecordLayout = RecordLayout {
    name: "model",
    fields: &[
        desc(Field::Mins, F32, 3),
        desc(Field::Maxs, F32, 3),
        desc(Field::FirstSurface, I32, 1),
        desc(Field::NumSurfaces, I32, 1),
        desc(Field::FirstBrush, I32, 1),
        desc(Field::NumBrushes, I32, 1),
    ],
};

pub static LEAF_SURFACE: RecordLayout = RecordLayout {
    name: "leaf surface",
    fields: &[desc(Field::Surface, I32, 1)],
};

pub static Q3_BRUSH_SIDE: RecordLayout = RecordLayout {
    name: "q3 brush side",
    fields: &[desc(Field::Plane, I32, 1), desc(Field::Shader, I32, 1)],
};

pub static RBSP_BRUSH_SIDE: RecordLayout = RecordLayout {
    name: "rbsp brush side",
    fields: &[
        desc(Field::Plane, I32, 1),
        desc(Field::Shader, I32, 1),
        desc(Field::DrawSurface, I32, 1),
    ],
};

pub static FAKK_ENTLIGHT: RecordLayout = RecordLayout {
    name: "fakk entity light",
    fields: &[
        desc(Field::Position, F32, 3),
        desc(Field::Color, F32, 3),
        desc(Field::Intensity, F32, 1),
        desc(Field::Leaf, I32, 1),
        desc(Field::NeedsTrace, I32, 1),
        desc(Field::SpotLight, I32, 1),
        desc(Field::SpotDir, F32, 3),
        desc(Field::SpotRadiusByDistance, F32, 1),
    ],
};

pub static ALICE_ENTLIGHT: RecordLayout = RecordLayout {
    name: "alice entity light",
    fields: &[
        desc(Field::Position, F32, 3),
        desc(Field::Color, F32, 3),
        desc(Field::Intensity, F32, 1),
        desc(Field::Style, I32, 1),
        desc(Field::Leaf, I32, 1),
        desc(Field::NeedsTrace, I32, 1),
        desc(Field::SpotLight, I32, 1),
        desc(Field::SpotDir, F32, 3),
        desc(Field::SpotRadiusByDistance, F32, 1),
    ],
};

/// One record of a typed lump: its raw bytes together with the layout that describes them.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    layout: &'static RecordLayout,
    bytes: Vec<u8>,
}

impl Record {
    pub fn zeroed(layout: &'static RecordLayout) -> Self {
        Self {
            layout,
            bytes: vec![0; layout.size()],
        }
    }

    pub fn from_bytes(layout: &'static RecordLayout, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != layout.size() {
            bail!(
                "{} record must be {} bytes, got {}",
                layout.name,
                layout.size(),
                bytes.len(),
            );
        }
        Ok(Self {
            layout,
            bytes: bytes.to_vec(),
        })
    }

    pub fn layout(&self) -> &'static RecordLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get_i32(&self, field: Field, index: usize) -> Result<i32> {
        let offset = self.layout.locate(field, I32, index)?;
        Ok(LittleEndian::read_i32(&self.bytes[offset..]))
    }

    pub fn set_i32(&mut self, field: Field, index: usize, value: i32) -> Result<()> {
        let offset = self.layout.locate(field, I32, index)?;
        LittleEndian::write_i32(&mut self.bytes[offset..], value);
        Ok(())
    }

    pub fn field_bytes(&self, field: Field) -> Result<&[u8]> {
        let offset = self.layout.locate(field, U8, 0)?;
        let len = self.layout.field(field).map(|(_, desc)| desc.count).unwrap_or(0);
        Ok(&self.bytes[offset..offset + len])
    }

    /// Copies `value` into a byte field, truncating it to the field length and zero-filling the
    /// remainder.
    pub fn set_field_bytes(&mut self, field: Field, value: &[u8]) -> Result<()> {
        let offset = self.layout.locate(field, U8, 0)?;
        let len = self.layout.field(field).map(|(_, desc)| desc.count).unwrap_or(0);
        let dst = &mut self.bytes[offset..offset + len];
        let copied = value.len().min(len);
        dst[..copied].copy_from_slice(&value[..copied]);
        dst[copied..].fill(0);
        Ok(())
    }

    /// Reads a NUL-terminated byte string field as Latin-1 text.
    pub fn get_str(&self, field: Field) -> Result<String> {
        let bytes = self.field_bytes(field)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(bytes[..end].iter().map(|&b| b as char).collect())
    }

    /// Number of elements in `field`, or `None` if the layout doesn't define it.
    pub fn count(&self, field: Field) -> Option<usize> {
        self.layout.field(field).map(|(_, desc)| desc.count)
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Record")
            .field("layout", &self.layout.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn decode_records(layout: &'static RecordLayout, data: &[u8]) -> Result<Vec<Record>> {
    let size = layout.size();
    if data.len() % size != 0 {
        bail!(
            "lump of {} bytes is not a whole number of {} records ({} bytes each)",
            data.len(),
            layout.name,
            size,
        );
    }
    data.chunks_exact(size)
        .map(|chunk| Record::from_bytes(layout, chunk))
        .collect()
}

pub fn encode_records(records: &[Record], out: &mut Vec<u8>) {
    for record in records {
        out.extend_from_slice(record.as_bytes());
    }
}
