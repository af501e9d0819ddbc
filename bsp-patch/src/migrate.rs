use anyhow::Result;
use idtech3_bsp::bsp::Bsp;
use idtech3_bsp::format::{LumpName, ALICE42, FAKK12};
use log::info;

use crate::error::PatchError;
use crate::light::EntLight;
use crate::pipeline::{Context, Milestone, Outcome, Stage};

/// Converts a Heavy Metal FAKK2 map into one American McGee's Alice loads: every entity light
/// gains a style and the header moves to version 42.
pub struct MigrateLights;

fn stored_lights_summary(checksum: Option<i32>, count: usize) -> String {
    match checksum {
        Some(checksum) => format!("checksum {:#010x}, stored lights: {}", checksum, count),
        None => format!("no checksum, stored lights: {}", count),
    }
}

impl Stage for MigrateLights {
    fn name(&self) -> &'static str {
        "migrate entity lights"
    }

    fn provides(&self) -> Milestone {
        Milestone::LightsMigrated
    }

    fn run(&self, bsp: &mut Bsp, _cx: &mut Context) -> Result<Outcome> {
        let header = bsp.header();
        if header.magic != FAKK12.magic || header.version != FAKK12.version {
            return Err(PatchError::FormatMismatch {
                expected: format!("{} version {}", FAKK12.magic_str(), FAKK12.version),
                found: format!("{} version {}", header.magic_str(), header.version),
            }
            .into());
        }

        let lights = bsp
            .records(LumpName::EntLights)?
            .iter()
            .map(|record| EntLight::Alice(EntLight::from_record(record)?.into_alice()).to_record())
            .collect::<Result<Vec<_>>>()?;
        info!("{}", stored_lights_summary(bsp.header().checksum, lights.len()));

        bsp.retarget(&ALICE42, vec![(LumpName::EntLights, lights)])?;
        Ok(Outcome::Applied)
    }
}
