//! Ordered stages over one mutable BSP.
//!
//! Each stage names the milestones it depends on and the one it reaches. A pipeline whose
//! stages are out of order is rejected when it is built, before any BSP is touched. Files the
//! stages want written are collected as [`Sidecar`]s and only written once every stage has
//! succeeded.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use idtech3_bsp::bsp::Bsp;
use log::{error, info};

use crate::shader_script::encode_latin1;
use crate::tga::write_lightmap_tga;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Milestone {
    LightmapsSplit,
    LightmapIndicesHalved,
    LightsMigrated,
    NomipShadersAppended,
    SurfacesPrepended,
}

/// A file produced alongside the output BSP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sidecar {
    /// A 128x128 RGB lightmap, written as TGA.
    Image { path: PathBuf, pixels: Vec<u8> },
    /// Text written one line per entry, each terminated by `\n`.
    Text { path: PathBuf, lines: Vec<String> },
}

impl Sidecar {
    pub fn path(&self) -> &Path {
        match self {
            Sidecar::Image { path, .. } | Sidecar::Text { path, .. } => path,
        }
    }

    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Creating {}", parent.display()))?;
            }
        }
        match self {
            Sidecar::Image { path, pixels } => write_lightmap_tga(path, pixels),
            Sidecar::Text { path, lines } => {
                let file =
                    File::create(path).with_context(|| format!("Creating {}", path.display()))?;
                let mut w = BufWriter::new(file);
                for line in lines {
                    w.write_all(&encode_latin1(line))?;
                    w.write_all(b"\n")?;
                }
                w.flush()
                    .with_context(|| format!("Writing {}", path.display()))?;
                Ok(())
            }
        }
    }
}

/// State shared between the stages of one run.
#[derive(Debug, Default)]
pub struct Context {
    pub sidecars: Vec<Sidecar>,
    /// Indices of shader records appended to the shader lump during this run.
    pub appended_shaders: Vec<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A precondition isn't met; the run stops without writing anything.
    NothingToDo(String),
}

pub trait Stage {
    fn name(&self) -> &'static str;

    fn requires(&self) -> &'static [Milestone] {
        &[]
    }

    fn provides(&self) -> Milestone;

    /// Mutates `bsp`. A stage that fails must leave `bsp` as it found it.
    fn run(&self, bsp: &mut Bsp, cx: &mut Context) -> Result<Outcome>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum Report {
    /// Every stage applied; the BSP and these sidecars are ready to be written.
    Ready(Vec<Sidecar>),
    NothingToDo(String),
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        let mut reached = Vec::new();
        for stage in &stages {
            for milestone in stage.requires() {
                if !reached.contains(milestone) {
                    bail!(
                        "stage {} requires {:?}, which no earlier stage provides",
                        stage.name(),
                        milestone,
                    );
                }
            }
            reached.push(stage.provides());
        }
        Ok(Self { stages })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, bsp: &mut Bsp) -> Result<Report> {
        let mut cx = Context::default();
        for stage in &self.stages {
            match stage
                .run(bsp, &mut cx)
                .with_context(|| format!("Stage {}", stage.name()))?
            {
                Outcome::Applied => info!("{}: done", stage.name()),
                Outcome::NothingToDo(reason) => {
                    info!("{}: nothing to do: {}", stage.name(), reason);
                    return Ok(Report::NothingToDo(reason));
                }
            }
        }
        Ok(Report::Ready(cx.sidecars))
    }
}

/// Writes the sidecars and then the BSP. Every file is attempted even if an earlier one fails;
/// files already written stay in place.
pub fn write_outputs(bsp_path: &Path, bsp: &Bsp, sidecars: &[Sidecar]) -> Result<()> {
    let mut failed = Vec::new();
    for sidecar in sidecars {
        match sidecar.write() {
            Ok(()) => info!("Wrote {}", sidecar.path().display()),
            Err(e) => {
                error!("{:?}", e);
                failed.push(sidecar.path().to_path_buf());
            }
        }
    }

    let result = bsp.to_bytes().and_then(|bytes| {
        fs::write(bsp_path, bytes).with_context(|| format!("Writing {}", bsp_path.display()))
    });
    match result {
        Ok(()) => info!("Wrote {}", bsp_path.display()),
        Err(e) => {
            error!("{:?}", e);
            failed.push(bsp_path.to_path_buf());
        }
    }

    if !failed.is_empty() {
        bail!(
            "failed to write {}",
            failed
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    Ok(())
}
