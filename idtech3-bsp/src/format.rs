use crate::record::{
    RecordLayout, ALICE_ENTLIGHT, FAKK_ENTLIGHT, FAKK_SHADER, FAKK_SURFACE, LEAF_SURFACE, LIGHTMAP,
    MODEL, Q3_BRUSH_SIDE, Q3_SHADER, Q3_SURFACE, RBSP_BRUSH_SIDE, RBSP_SURFACE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LumpName {
    Entities,
    Shaders,
    Planes,
    Nodes,
    Leafs,
    LeafSurfaces,
    LeafBrushes,
    Models,
    Brushes,
    BrushSides,
    DrawVerts,
    DrawIndexes,
    Fogs,
    Surfaces,
    Lightmaps,
    LightGrid,
    Visibility,
    LightArray,
    EntLights,
    EntLightsVis,
    LightDefs,
}

impl LumpName {
    pub fn name(self) -> &'static str {
        match self {
            LumpName::Entities => "entities",
            LumpName::Shaders => "shaders",
            LumpName::Planes => "planes",
            LumpName::Nodes => "nodes",
            LumpName::Leafs => "leafs",
            LumpName::LeafSurfaces => "leafsurfaces",
            LumpName::LeafBrushes => "leafbrushes",
            LumpName::Models => "models",
            LumpName::Brushes => "brushes",
            LumpName::BrushSides => "brushsides",
            LumpName::DrawVerts => "drawverts",
            LumpName::DrawIndexes => "drawindexes",
            LumpName::Fogs => "fogs",
            LumpName::Surfaces => "surfaces",
            LumpName::Lightmaps => "lightmaps",
            LumpName::LightGrid => "lightgrid",
            LumpName::Visibility => "visibility",
            LumpName::LightArray => "lightarray",
            LumpName::EntLights => "entlights",
            LumpName::EntLightsVis => "entlightsvis",
            LumpName::LightDefs => "lightdefs",
        }
    }
}

/// A lump directory slot: the lump stored there and, for typed lumps, its record layout.
pub type LumpSlot = (LumpName, Option<&'static RecordLayout>);

#[derive(Debug, PartialEq, Eq)]
pub struct BspFormat {
    pub name: &'static str,
    pub magic: [u8; 4],
    pub version: i32,
    pub has_checksum: bool,
    /// Lumps in directory order.
    pub lumps: &'static [LumpSlot],
}

impl BspFormat {
    pub fn layout(&self, lump: LumpName) -> Option<&'static RecordLayout> {
        self.lumps
            .iter()
            .find(|&&(name, _)| name == lump)
            .and_then(|&(_, layout)| layout)
    }

    pub fn header_size(&self) -> usize {
        8 + if self.has_checksum { 4 } else { 0 } + 8 * self.lumps.len()
    }

    pub fn magic_str(&self) -> String {
        String::from_utf8_lossy(&self.magic).into_owned()
    }
}

static Q3_LUMPS: [LumpSlot; 17] = [
    (LumpName::Entities, None),
    (LumpName::Shaders, Some(&Q3_SHADER)),
    (LumpName::Planes, None),
    (LumpName::Nodes, None),
    (LumpName::Leafs, None),
    (LumpName::LeafSurfaces, Some(&LEAF_SURFACE)),
    (LumpName::LeafBrushes, None),
    (LumpName::Models, Some(&MODEL)),
    (LumpName::Brushes, None),
    (LumpName::BrushSides, Some(&Q3_BRUSH_SIDE)),
    (LumpName::DrawVerts, None),
    (LumpName::DrawIndexes, None),
    (LumpName::Fogs, None),
    (LumpName::Surfaces, Some(&Q3_SURFACE)),
    (LumpName::Lightmaps, Some(&LIGHTMAP)),
    (LumpName::LightGrid, None),
    (LumpName::Visibility, None),
];

static RBSP_LUMPS: [LumpSlot; 18] = [
    (LumpName::Entities, None),
    (LumpName::Shaders, Some(&Q3_SHADER)),
    (LumpName::Planes, None),
    (LumpName::Nodes, None),
    (LumpName::Leafs, None),
    (LumpName::LeafSurfaces, Some(&LEAF_SURFACE)),
    (LumpName::LeafBrushes, None),
    (LumpName::Models, Some(&MODEL)),
    (LumpName::Brushes, None),
    (LumpName::BrushSides, Some(&RBSP_BRUSH_SIDE)),
    (LumpName::DrawVerts, None),
    (LumpName::DrawIndexes, None),
    (LumpName::Fogs, None),
    (LumpName::Surfaces, Some(&RBSP_SURFACE)),
    (LumpName::Lightmaps, Some(&LIGHTMAP)),
    (LumpName::LightGrid, None),
    (LumpName::Visibility, None),
    (LumpName::LightArray, None),
];

static FAKK_LUMPS: [LumpSlot; 20] = [
    (LumpName::Shaders, Some(&FAKK_SHADER)),
    (LumpName::Planes, None),
    (LumpName::Lightmaps, Some(&LIGHTMAP)),
    (LumpName::Surfaces, Some(&FAKK_SURFACE)),
    (LumpName::DrawVerts, None),
    (LumpName::DrawIndexes, None),
    (LumpName::LeafBrushes, None),
    (LumpName::LeafSurfaces, Some(&LEAF_SURFACE)),
    (LumpName::Leafs, None),
    (LumpName::Nodes, None),
    (LumpName::BrushSides, Some(&Q3_BRUSH_SIDE)),
    (LumpName::Brushes, None),
    (LumpName::Fogs, None),
    (LumpName::Models, Some(&MODEL)),
    (LumpName::Entities, None),
    (LumpName::Visibility, None),
    (LumpName::LightGrid, None),
    (LumpName::EntLights, Some(&FAKK_ENTLIGHT)),
    (LumpName::EntLightsVis, None),
    (LumpName::LightDefs, None),
];

// Same directory as FAKK2; only the entity light record grew a field.
static ALICE_LUMPS: [LumpSlot; 20] = [
    (LumpName::Shaders, Some(&FAKK_SHADER)),
    (LumpName::Planes, None),
    (LumpName::Lightmaps, Some(&LIGHTMAP)),
    (LumpName::Surfaces, Some(&FAKK_SURFACE)),
    (LumpName::DrawVerts, None),
    (LumpName::DrawIndexes, None),
    (LumpName::LeafBrushes, None),
    (LumpName::LeafSurfaces, Some(&LEAF_SURFACE)),
    (LumpName::Leafs, None),
    (LumpName::Nodes, None),
    (LumpName::BrushSides, Some(&Q3_BRUSH_SIDE)),
    (LumpName::Brushes, None),
    (LumpName::Fogs, None),
    (LumpName::Models, Some(&MODEL)),
    (LumpName::Entities, None),
    (LumpName::Visibility, None),
    (LumpName::LightGrid, None),
    (LumpName::EntLights, Some(&ALICE_ENTLIGHT)),
    (LumpName::EntLightsVis, None),
    (LumpName::LightDefs, None),
];

pub static IBSP46: BspFormat = BspFormat {
    name: "Quake 3",
    magic: *b"IBSP",
    version: 46,
    has_checksum: false,
    lumps: &Q3_LUMPS,
};

pub static IBSP47: BspFormat = BspFormat {
    name: "Quake Live",
    magic: *b"IBSP",
    version: 47,
    has_checksum: false,
    lumps: &Q3_LUMPS,
};

pub static RBSP1: BspFormat = BspFormat {
    name: "Raven",
    magic: *b"RBSP",
    version: 1,
    has_checksum: false,
    lumps: &RBSP_LUMPS,
};

pub static FAKK12: BspFormat = BspFormat {
    name: "Heavy Metal FAKK2",
    magic: *b"FAKK",
    version: 12,
    has_checksum: true,
    lumps: &FAKK_LUMPS,
};

pub static ALICE42: BspFormat = BspFormat {
    name: "American McGee's Alice",
    magic: *b"FAKK",
    version: 42,
    has_checksum: true,
    lumps: &ALICE_LUMPS,
};

pub static FORMATS: &[&BspFormat] = &[&IBSP46, &IBSP47, &RBSP1, &FAKK12, &ALICE42];

pub fn find_format(magic: [u8; 4], version: i32) -> Option<&'static BspFormat> {
    FORMATS
        .iter()
        .copied()
        .find(|format| format.magic == magic && format.version == version)
}
