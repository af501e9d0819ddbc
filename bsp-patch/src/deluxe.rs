//! Moving deluxe maps out of an interleaved lightmap lump.
//!
//! Maps compiled with deluxemapping store lightmaps in pairs: slot `2k` is the base lightmap
//! and `2k + 1` its deluxe map. The split keeps the base lightmaps in the BSP and turns each
//! deluxe map into a standalone TGA.

use std::path::PathBuf;

use anyhow::Result;
use idtech3_bsp::bsp::Bsp;
use idtech3_bsp::format::LumpName;
use idtech3_bsp::record::{Field, Record};
use log::{debug, warn};

use crate::pipeline::{Context, Milestone, Outcome, Sidecar, Stage};
use crate::remap::halve_indices;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightmapSlot {
    pub index: usize,
    pub is_deluxe: bool,
    /// Index of the base/deluxe pair this slot belongs to.
    pub pair_index: usize,
}

pub fn enumerate_pairs(len: usize) -> Vec<LightmapSlot> {
    (0..len)
        .map(|index| LightmapSlot {
            index,
            is_deluxe: index % 2 == 1,
            pair_index: index >> 1,
        })
        .collect()
}

/// Why a lightmap lump of `len` records can't hold interleaved deluxe maps, if it can't.
pub fn missing_deluxe_maps(len: usize) -> Option<String> {
    if len < 2 {
        Some("no internal deluxemaps found".to_string())
    } else if len % 2 != 0 {
        Some(format!("{} lightmaps can't be base/deluxe pairs", len))
    } else {
        None
    }
}

pub fn deluxe_image_name(pair_index: usize) -> String {
    format!("dm_{:04}.tga", pair_index)
}

/// Keeps the even lightmap slots and turns the odd ones into image sidecars under `image_dir`.
pub struct SplitDeluxemaps {
    pub image_dir: PathBuf,
}

impl Stage for SplitDeluxemaps {
    fn name(&self) -> &'static str {
        "split deluxemaps"
    }

    fn provides(&self) -> Milestone {
        Milestone::LightmapsSplit
    }

    fn run(&self, bsp: &mut Bsp, cx: &mut Context) -> Result<Outcome> {
        let lightmaps = bsp.records(LumpName::Lightmaps)?;
        if let Some(reason) = missing_deluxe_maps(lightmaps.len()) {
            return Ok(Outcome::NothingToDo(reason));
        }

        let mut direct = 0;
        for surface in bsp.records(LumpName::Surfaces)? {
            let layers = surface.count(Field::LightmapNum).unwrap_or(0);
            for layer in 0..layers {
                let index = surface.get_i32(Field::LightmapNum, layer)?;
                if index >= 0 && index % 2 == 1 {
                    direct += 1;
                }
            }
        }
        if direct > 0 {
            warn!("{} surface lightmap references point at deluxe maps", direct);
        }

        let mut kept = Vec::with_capacity(lightmaps.len() / 2);
        let mut images = Vec::with_capacity(lightmaps.len() / 2);
        for slot in enumerate_pairs(lightmaps.len()) {
            let lightmap = &lightmaps[slot.index];
            if slot.is_deluxe {
                let path = self.image_dir.join(deluxe_image_name(slot.pair_index));
                debug!("lightmap {} is deluxe: {}", slot.index, path.display());
                images.push(Sidecar::Image {
                    path,
                    pixels: lightmap.field_bytes(Field::Pixels)?.to_vec(),
                });
            } else {
                kept.push(lightmap.clone());
            }
        }

        bsp.replace_lumps(vec![(LumpName::Lightmaps, kept)])?;
        cx.sidecars.extend(images);
        Ok(Outcome::Applied)
    }
}

/// Renumbers surface lightmap references after the split.
pub struct HalveLightmapIndices;

impl Stage for HalveLightmapIndices {
    fn name(&self) -> &'static str {
        "halve lightmap indices"
    }

    fn requires(&self) -> &'static [Milestone] {
        &[Milestone::LightmapsSplit]
    }

    fn provides(&self) -> Milestone {
        Milestone::LightmapIndicesHalved
    }

    fn run(&self, bsp: &mut Bsp, _cx: &mut Context) -> Result<Outcome> {
        let mut surfaces: Vec<Record> = bsp.records(LumpName::Surfaces)?.to_vec();
        let changed = halve_indices(&mut surfaces, Field::LightmapNum)?;
        debug!("{} lightmap references renumbered", changed);
        bsp.replace_lumps(vec![(LumpName::Surfaces, surfaces)])?;
        Ok(Outcome::Applied)
    }
}
