//! Forcing external lightmaps to load without mipmaps.
//!
//! q3map2 only lets a shader disable mipmapping for the images it references, so the map gets
//! one generated shader per eight external lightmaps, each applied to a generated surface that
//! keeps the shader loaded.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use idtech3_bsp::bsp::Bsp;
use idtech3_bsp::format::LumpName;
use idtech3_bsp::record::{Field, Record};
use log::{debug, warn};

use crate::error::PatchError;
use crate::pipeline::{Context, Milestone, Outcome, Sidecar, Stage};
use crate::remap::shift_surface_references;
use crate::shader_script::{encode_latin1, parse_blocks, patch_script, IMAGES_PER_BLOCK};

/// Longest shader name the engine accepts; the 64-byte field also holds the terminator.
pub const MAX_SHADER_NAME_LEN: usize = 62;

pub fn nomip_shader_names(map_name: &str, image_count: usize) -> Vec<String> {
    let blocks = (image_count + IMAGES_PER_BLOCK - 1) / IMAGES_PER_BLOCK;
    (0..blocks)
        .map(|i| format!("{}/force_nomip_{}", map_name, i))
        .collect()
}

/// Rewrites the map's q3map2 shader script and appends a shader record per generated block.
pub struct AppendNomipShaders {
    /// Map path below `maps/`, without extension.
    pub map_name: String,
    /// External lightmap paths, in the order they are to be listed.
    pub images: Vec<String>,
    pub script_path: PathBuf,
    /// Current script contents; empty if the script doesn't exist yet.
    pub script_text: String,
}

impl AppendNomipShaders {
    fn check_script(&self, lines: &[String], names: &[String]) -> Result<()> {
        let text: String = lines.iter().map(|line| format!("{}\n", line)).collect();
        let blocks = match parse_blocks(&text) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("{}: {}", self.script_path.display(), e);
                return Ok(());
            }
        };
        for name in names {
            let count = blocks
                .iter()
                .filter(|block| block.name.eq_ignore_ascii_case(name))
                .count();
            if count != 1 {
                bail!("shader {} defined {} times after patching", name, count);
            }
        }
        Ok(())
    }
}

impl Stage for AppendNomipShaders {
    fn name(&self) -> &'static str {
        "append nomip shaders"
    }

    fn provides(&self) -> Milestone {
        Milestone::NomipShadersAppended
    }

    fn run(&self, bsp: &mut Bsp, cx: &mut Context) -> Result<Outcome> {
        if self.images.is_empty() {
            return Ok(Outcome::NothingToDo(format!(
                "no external lightmaps found for {}",
                self.map_name,
            )));
        }

        let names = nomip_shader_names(&self.map_name, self.images.len());
        for name in &names {
            if encode_latin1(name).len() > MAX_SHADER_NAME_LEN {
                return Err(PatchError::NameTooLong {
                    name: name.clone(),
                    max: MAX_SHADER_NAME_LEN,
                }
                .into());
            }
        }

        let lines = patch_script(&self.script_text, &names, &self.images);
        self.check_script(&lines, &names)?;

        let layout = bsp
            .format()
            .layout(LumpName::Shaders)
            .context("format has no shader records")?;
        let mut shaders = bsp.records(LumpName::Shaders)?.to_vec();
        let mut appended = Vec::with_capacity(names.len());
        for name in &names {
            let mut shader = Record::zeroed(layout);
            shader.set_field_bytes(Field::Name, &encode_latin1(name))?;
            appended.push(i32::try_from(shaders.len()).context("too many shaders")?);
            shaders.push(shader);
        }
        debug!("shaders {:?} appended as {:?}", names, appended);

        bsp.replace_lumps(vec![(LumpName::Shaders, shaders)])?;
        cx.appended_shaders = appended;
        cx.sidecars.push(Sidecar::Text {
            path: self.script_path.clone(),
            lines,
        });
        Ok(Outcome::Applied)
    }
}

/// Puts one surface per appended shader at the head of the surfaces lump and moves every
/// surface reference past them.
pub struct PrependNomipSurfaces;

impl Stage for PrependNomipSurfaces {
    fn name(&self) -> &'static str {
        "prepend nomip surfaces"
    }

    fn requires(&self) -> &'static [Milestone] {
        &[Milestone::NomipShadersAppended]
    }

    fn provides(&self) -> Milestone {
        Milestone::SurfacesPrepended
    }

    fn run(&self, bsp: &mut Bsp, cx: &mut Context) -> Result<Outcome> {
        let surfaces = bsp.records(LumpName::Surfaces)?;
        let template = match surfaces.first() {
            Some(surface) => surface,
            None => bail!("map has no surface to copy"),
        };

        let mut new_surfaces = Vec::with_capacity(cx.appended_shaders.len() + surfaces.len());
        for &shader in &cx.appended_shaders {
            let mut surface = template.clone();
            surface.set_i32(Field::Shader, 0, shader)?;
            new_surfaces.push(surface);
        }
        let k = i32::try_from(new_surfaces.len()).context("too many surfaces")?;
        new_surfaces.extend_from_slice(surfaces);

        let mut replacements = shift_surface_references(bsp, k)?;
        replacements.push((LumpName::Surfaces, new_surfaces));
        bsp.replace_lumps(replacements)?;
        Ok(Outcome::Applied)
    }
}
