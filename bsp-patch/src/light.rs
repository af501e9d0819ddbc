use std::io::{self, Read, Write};

use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use idtech3_bsp::record::{Record, RecordLayout, ALICE_ENTLIGHT, FAKK_ENTLIGHT};

use crate::codec::{read_f32s, write_f32s, LittleEndianRecord};

/// Entity light as stored by Heavy Metal FAKK2 (version 12).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FakkLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    pub leaf: i32,
    pub needs_trace: i32,
    pub spot_light: i32,
    pub spot_dir: [f32; 3],
    pub spot_radius_by_distance: f32,
}

/// Entity light as stored by American McGee's Alice (version 42). Identical to [`FakkLight`]
/// apart from `style`, which sits between `intensity` and `leaf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AliceLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    pub style: i32,
    pub leaf: i32,
    pub needs_trace: i32,
    pub spot_light: i32,
    pub spot_dir: [f32; 3],
    pub spot_radius_by_distance: f32,
}

impl LittleEndianRecord for FakkLight {
    const SIZE: usize = 60;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            position: read_f32s(r)?,
            color: read_f32s(r)?,
            intensity: r.read_f32::<LittleEndian>()?,
            leaf: r.read_i32::<LittleEndian>()?,
            needs_trace: r.read_i32::<LittleEndian>()?,
            spot_light: r.read_i32::<LittleEndian>()?,
            spot_dir: read_f32s(r)?,
            spot_radius_by_distance: r.read_f32::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_f32s(w, &self.position)?;
        write_f32s(w, &self.color)?;
        w.write_f32::<LittleEndian>(self.intensity)?;
        w.write_i32::<LittleEndian>(self.leaf)?;
        w.write_i32::<LittleEndian>(self.needs_trace)?;
        w.write_i32::<LittleEndian>(self.spot_light)?;
        write_f32s(w, &self.spot_dir)?;
        w.write_f32::<LittleEndian>(self.spot_radius_by_distance)?;
        Ok(())
    }
}

impl LittleEndianRecord for AliceLight {
    const SIZE: usize = 64;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            position: read_f32s(r)?,
            color: read_f32s(r)?,
            intensity: r.read_f32::<LittleEndian>()?,
            style: r.read_i32::<LittleEndian>()?,
            leaf: r.read_i32::<LittleEndian>()?,
            needs_trace: r.read_i32::<LittleEndian>()?,
            spot_light: r.read_i32::<LittleEndian>()?,
            spot_dir: read_f32s(r)?,
            spot_radius_by_distance: r.read_f32::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_f32s(w, &self.position)?;
        write_f32s(w, &self.color)?;
        w.write_f32::<LittleEndian>(self.intensity)?;
        w.write_i32::<LittleEndian>(self.style)?;
        w.write_i32::<LittleEndian>(self.leaf)?;
        w.write_i32::<LittleEndian>(self.needs_trace)?;
        w.write_i32::<LittleEndian>(self.spot_light)?;
        write_f32s(w, &self.spot_dir)?;
        w.write_f32::<LittleEndian>(self.spot_radius_by_distance)?;
        Ok(())
    }
}

impl From<FakkLight> for AliceLight {
    fn from(light: FakkLight) -> Self {
        Self {
            position: light.position,
            color: light.color,
            intensity: light.intensity,
            // Float to int casts truncate toward zero and saturate.
            style: (light.intensity * 0.5) as i32,
            leaf: light.leaf,
            needs_trace: light.needs_trace,
            spot_light: light.spot_light,
            spot_dir: light.spot_dir,
            spot_radius_by_distance: light.spot_radius_by_distance,
        }
    }
}

/// An entity light in any of the supported on-disk layouts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntLight {
    Fakk(FakkLight),
    Alice(AliceLight),
}

impl EntLight {
    pub fn from_record(record: &Record) -> Result<Self> {
        let layout = record.layout();
        if layout == &FAKK_ENTLIGHT {
            Ok(EntLight::Fakk(FakkLight::decode(record.as_bytes())?))
        } else if layout == &ALICE_ENTLIGHT {
            Ok(EntLight::Alice(AliceLight::decode(record.as_bytes())?))
        } else {
            bail!("{} is not an entity light layout", layout.name)
        }
    }

    pub fn layout(&self) -> &'static RecordLayout {
        match self {
            EntLight::Fakk(_) => &FAKK_ENTLIGHT,
            EntLight::Alice(_) => &ALICE_ENTLIGHT,
        }
    }

    pub fn to_record(&self) -> Result<Record> {
        let bytes = match self {
            EntLight::Fakk(light) => light.encode()?,
            EntLight::Alice(light) => light.encode()?,
        };
        Record::from_bytes(self.layout(), &bytes)
    }

    pub fn into_alice(self) -> AliceLight {
        match self {
            EntLight::Fakk(light) => light.into(),
            EntLight::Alice(light) => light,
        }
    }
}

#[cfg(test)]
mod tests {
    use idtech3_bsp::record::Field;
    use quickcheck::{Arbitrary, Gen};

    use super::*;

    impl Arbitrary for FakkLight {
        fn arbitrary(g: &mut Gen) -> Self {
            Self {
                position: [f32::arbitrary(g), f32::arbitrary(g), f32::arbitrary(g)],
                color: [f32::arbitrary(g), f32::arbitrary(g), f32::arbitrary(g)],
                intensity: f32::arbitrary(g),
                leaf: i32::arbitrary(g),
                needs_trace: i32::arbitrary(g),
                spot_light: i32::arbitrary(g),
                spot_dir: [f32::arbitrary(g), f32::arbitrary(g), f32::arbitrary(g)],
                spot_radius_by_distance: f32::arbitrary(g),
            }
        }
    }

    impl Arbitrary for AliceLight {
        fn arbitrary(g: &mut Gen) -> Self {
            let mut light = AliceLight::from(FakkLight::arbitrary(g));
            light.style = i32::arbitrary(g);
            light
        }
    }

    fn bits(values: &[f32]) -> Vec<u32> {
        values.iter().map(|v| v.to_bits()).collect()
    }

    fn scenario_light() -> FakkLight {
        FakkLight {
            position: [128.0, -64.0, 32.5],
            color: [1.0, 0.5, 0.25],
            intensity: 10.0,
            leaf: 2,
            needs_trace: 1,
            spot_light: 0,
            spot_dir: [0.0, 0.0, -1.0],
            spot_radius_by_distance: 0.0,
        }
    }

    #[test]
    fn sizes_match_registered_layouts() {
        assert_eq!(FakkLight::SIZE, FAKK_ENTLIGHT.size());
        assert_eq!(AliceLight::SIZE, ALICE_ENTLIGHT.size());
    }

    #[test]
    fn fakk_to_alice() {
        let alice = AliceLight::from(scenario_light());
        assert_eq!(
            alice,
            AliceLight {
                position: [128.0, -64.0, 32.5],
                color: [1.0, 0.5, 0.25],
                intensity: 10.0,
                style: 5,
                leaf: 2,
                needs_trace: 1,
                spot_light: 0,
                spot_dir: [0.0, 0.0, -1.0],
                spot_radius_by_distance: 0.0,
            },
        );
    }

    #[test]
    fn style_truncates_toward_zero() {
        let mut light = scenario_light();
        light.intensity = 7.0;
        assert_eq!(AliceLight::from(light).style, 3);
        light.intensity = -7.0;
        assert_eq!(AliceLight::from(light).style, -3);
        light.intensity = f32::NAN;
        assert_eq!(AliceLight::from(light).style, 0);
    }

    #[test]
    fn records_agree_with_layout_offsets() {
        let record = EntLight::Alice(scenario_light().into()).to_record().unwrap();
        assert_eq!(&record.as_bytes()[24..28], &10.0f32.to_le_bytes());
        assert_eq!(record.get_i32(Field::Style, 0).unwrap(), 5);
        assert_eq!(record.get_i32(Field::Leaf, 0).unwrap(), 2);
        assert_eq!(&record.as_bytes()[52..56], &(-1.0f32).to_le_bytes());
    }

    #[test]
    fn from_record_dispatches_on_layout() {
        let record = EntLight::Fakk(scenario_light()).to_record().unwrap();
        assert_eq!(
            EntLight::from_record(&record).unwrap(),
            EntLight::Fakk(scenario_light()),
        );
        let wrong = Record::zeroed(&idtech3_bsp::record::MODEL);
        assert!(EntLight::from_record(&wrong).is_err());
    }

    #[quickcheck]
    fn fakk_round_trip(light: FakkLight) -> bool {
        let bytes = light.encode().unwrap();
        bytes.len() == FakkLight::SIZE
            && FakkLight::decode(&bytes).unwrap().encode().unwrap() == bytes
    }

    #[quickcheck]
    fn alice_round_trip(light: AliceLight) -> bool {
        let bytes = light.encode().unwrap();
        bytes.len() == AliceLight::SIZE
            && AliceLight::decode(&bytes).unwrap().encode().unwrap() == bytes
    }

    #[test]
    fn alice_field_order() {
        let light = AliceLight {
            position: [1.0, 2.0, 3.0],
            color: [4.0, 5.0, 6.0],
            intensity: 7.0,
            style: 8,
            leaf: 9,
            needs_trace: 10,
            spot_light: 11,
            spot_dir: [12.0, 13.0, 14.0],
            spot_radius_by_distance: 15.0,
        };
        let bytes = light.encode().unwrap();
        let word = |i: usize| [bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]];
        for i in [0, 1, 2, 3, 4, 5, 6, 11, 12, 13, 14] {
            assert_eq!(f32::from_le_bytes(word(i)), (i + 1) as f32);
        }
        for i in 7..11 {
            assert_eq!(i32::from_le_bytes(word(i)), (i + 1) as i32);
        }
        assert_eq!(AliceLight::decode(&bytes).unwrap(), light);
    }

    #[quickcheck]
    fn migration_preserves_shared_fields(light: FakkLight) -> bool {
        let alice = AliceLight::from(light);
        bits(&alice.position) == bits(&light.position)
            && bits(&alice.color) == bits(&light.color)
            && alice.intensity.to_bits() == light.intensity.to_bits()
            && alice.leaf == light.leaf
            && alice.needs_trace == light.needs_trace
            && alice.spot_light == light.spot_light
            && bits(&alice.spot_dir) == bits(&light.spot_dir)
            && alice.spot_radius_by_distance.to_bits() == light.spot_radius_by_distance.to_bits()
            && alice.style == (light.intensity * 0.5) as i32
    }
}
