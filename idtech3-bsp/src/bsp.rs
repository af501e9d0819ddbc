use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::format::{find_format, BspFormat, LumpName};
use crate::record::{decode_records, encode_records, Record};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 4],
    pub version: i32,
    /// Only present in FAKK-family headers.
    pub checksum: Option<i32>,
}

impl Header {
    pub fn magic_str(&self) -> String {
        String::from_utf8_lossy(&self.magic).into_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LumpData {
    Opaque(Vec<u8>),
    Records(Vec<Record>),
}

impl LumpData {
    /// Element count: records for typed lumps, bytes for opaque ones.
    pub fn len(&self) -> usize {
        match self {
            LumpData::Opaque(bytes) => bytes.len(),
            LumpData::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            LumpData::Opaque(bytes) => out.extend_from_slice(bytes),
            LumpData::Records(records) => encode_records(records, out),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lump {
    pub name: LumpName,
    pub data: LumpData,
}

/// An in-memory BSP: header plus every lump in directory order.
#[derive(Clone, Debug)]
pub struct Bsp {
    header: Header,
    format: &'static BspFormat,
    lumps: Vec<Lump>,
}

impl Bsp {
    /// Creates a BSP with every lump empty.
    pub fn new(format: &'static BspFormat) -> Self {
        Self {
            header: Header {
                magic: format.magic,
                version: format.version,
                checksum: format.has_checksum.then_some(0),
            },
            format,
            lumps: format
                .lumps
                .iter()
                .map(|&(name, layout)| Lump {
                    name,
                    data: match layout {
                        Some(_) => LumpData::Records(Vec::new()),
                        None => LumpData::Opaque(Vec::new()),
                    },
                })
                .collect(),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(data);
        let mut magic = [0; 4];
        r.read_exact(&mut magic).context("Reading BSP header")?;
        let version = r.read_i32::<LittleEndian>().context("Reading BSP header")?;
        let format = match find_format(magic, version) {
            Some(format) => format,
            None => bail!(
                "unsupported BSP format: {} version {}",
                String::from_utf8_lossy(&magic),
                version,
            ),
        };
        let checksum = if format.has_checksum {
            Some(r.read_i32::<LittleEndian>()?)
        } else {
            None
        };

        let mut lumps = Vec::with_capacity(format.lumps.len());
        for &(name, layout) in format.lumps {
            let offset = r.read_i32::<LittleEndian>()?;
            let length = r.read_i32::<LittleEndian>()?;
            if offset < 0 || length < 0 {
                bail!("lump {} has a negative offset or length", name.name());
            }
            let (offset, length) = (offset as usize, length as usize);
            let bytes = match data.get(offset..offset + length) {
                Some(bytes) => bytes,
                None => bail!(
                    "lump {} out of bounds: offset {}, length {}, file size {}",
                    name.name(),
                    offset,
                    length,
                    data.len(),
                ),
            };
            let lump_data = match layout {
                Some(layout) => LumpData::Records(
                    decode_records(layout, bytes)
                        .with_context(|| format!("Decoding lump {}", name.name()))?,
                ),
                None => LumpData::Opaque(bytes.to_vec()),
            };
            debug!("lump {}: {} elements", name.name(), lump_data.len());
            lumps.push(Lump {
                name,
                data: lump_data,
            });
        }

        Ok(Self {
            header: Header {
                magic,
                version,
                checksum,
            },
            format,
            lumps,
        })
    }

    /// Serializes the header, directory and lumps. Offsets and lengths are recomputed from the
    /// current lump contents; every lump starts on a 4-byte boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        let mut directory = Vec::with_capacity(self.lumps.len());
        let header_size = self.format.header_size();
        for lump in &self.lumps {
            while payload.len() % 4 != 0 {
                payload.push(0);
            }
            let start = payload.len();
            lump.data.encode(&mut payload);
            let offset = i32::try_from(header_size + start)
                .with_context(|| format!("Lump {} offset overflows", lump.name.name()))?;
            let length = i32::try_from(payload.len() - start)
                .with_context(|| format!("Lump {} length overflows", lump.name.name()))?;
            directory.push((offset, length));
        }

        let mut out = Vec::with_capacity(header_size + payload.len());
        out.extend_from_slice(&self.header.magic);
        out.write_i32::<LittleEndian>(self.header.version)?;
        if self.format.has_checksum {
            out.write_i32::<LittleEndian>(self.header.checksum.unwrap_or(0))?;
        }
        for (offset, length) in directory {
            out.write_i32::<LittleEndian>(offset)?;
            out.write_i32::<LittleEndian>(length)?;
        }
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn format(&self) -> &'static BspFormat {
        self.format
    }

    pub fn lumps(&self) -> &[Lump] {
        &self.lumps
    }

    pub fn lump(&self, name: LumpName) -> Option<&Lump> {
        self.lumps.iter().find(|lump| lump.name == name)
    }

    pub fn records(&self, name: LumpName) -> Result<&[Record]> {
        match self.lump(name).map(|lump| &lump.data) {
            Some(LumpData::Records(records)) => Ok(records),
            Some(LumpData::Opaque(_)) => bail!("lump {} is not a record lump", name.name()),
            None => bail!("{} has no {} lump", self.format.name, name.name()),
        }
    }

    /// Replaces several record lumps at once. Nothing is changed unless every replacement
    /// matches the layout registered for its lump.
    pub fn replace_lumps(&mut self, replacements: Vec<(LumpName, Vec<Record>)>) -> Result<()> {
        Self::check_replacements(self.format, &replacements)?;
        for (name, records) in replacements {
            let lump = self
                .lumps
                .iter_mut()
                .find(|lump| lump.name == name)
                .context("lump vanished during replacement")?;
            lump.data = LumpData::Records(records);
        }
        Ok(())
    }

    /// Switches the container to another format sharing the same lump directory, replacing the
    /// lumps whose layouts differ. Header magic and version follow the new format.
    pub fn retarget(
        &mut self,
        format: &'static BspFormat,
        replacements: Vec<(LumpName, Vec<Record>)>,
    ) -> Result<()> {
        let same_directory = format.lumps.len() == self.format.lumps.len()
            && format
                .lumps
                .iter()
                .zip(self.format.lumps)
                .all(|(a, b)| a.0 == b.0);
        if !same_directory {
            bail!(
                "cannot retarget {} to {}: lump directories differ",
                self.format.name,
                format.name,
            );
        }
        Self::check_replacements(format, &replacements)?;

        // Every typed lump that isn't replaced must already match the new format.
        for lump in &self.lumps {
            if replacements.iter().any(|(name, _)| *name == lump.name) {
                continue;
            }
            if let LumpData::Records(records) = &lump.data {
                let layout = format.layout(lump.name);
                if records.iter().any(|record| Some(record.layout()) != layout) {
                    bail!(
                        "lump {} must be converted before retargeting to {}",
                        lump.name.name(),
                        format.name,
                    );
                }
            }
        }

        self.format = format;
        self.header.magic = format.magic;
        self.header.version = format.version;
        if format.has_checksum {
            self.header.checksum.get_or_insert(0);
        } else {
            self.header.checksum = None;
        }
        self.replace_lumps(replacements)
    }

    fn check_replacements(
        format: &'static BspFormat,
        replacements: &[(LumpName, Vec<Record>)],
    ) -> Result<()> {
        for (name, records) in replacements {
            let layout = match format.layout(*name) {
                Some(layout) => layout,
                None => bail!("{} has no record lump {}", format.name, name.name()),
            };
            if let Some(record) = records.iter().find(|record| record.layout() != layout) {
                bail!(
                    "lump {} expects {} records, got {}",
                    name.name(),
                    layout.name,
                    record.layout().name,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ALICE42, FAKK12, IBSP46, RBSP1};
    use crate::record::{Field, ALICE_ENTLIGHT, FAKK_ENTLIGHT, LEAF_SURFACE, Q3_SURFACE};

    fn leaf_surfaces(values: &[i32]) -> Vec<Record> {
        values
            .iter()
            .map(|&value| {
                let mut record = Record::zeroed(&LEAF_SURFACE);
                record.set_i32(Field::Surface, 0, value).unwrap();
                record
            })
            .collect()
    }

    #[test]
    fn empty_round_trip() {
        let bsp = Bsp::new(&IBSP46);
        let bytes = bsp.to_bytes().unwrap();
        assert_eq!(bytes.len(), IBSP46.header_size());
        assert_eq!(&bytes[..4], b"IBSP");

        let parsed = Bsp::parse(&bytes).unwrap();
        assert_eq!(parsed.header(), bsp.header());
        assert_eq!(parsed.lumps(), bsp.lumps());
    }

    #[test]
    fn round_trip_with_records() {
        let mut bsp = Bsp::new(&FAKK12);
        bsp.header.checksum = Some(0x1234);
        bsp.replace_lumps(vec![(LumpName::LeafSurfaces, leaf_surfaces(&[3, 1, 2]))])
            .unwrap();
        if let Some(lump) = bsp.lumps.iter_mut().find(|l| l.name == LumpName::Entities) {
            lump.data = LumpData::Opaque(b"{\n\"classname\" \"worldspawn\"\n}\n\0".to_vec());
        }

        let bytes = bsp.to_bytes().unwrap();
        let parsed = Bsp::parse(&bytes).unwrap();
        assert_eq!(parsed.header().checksum, Some(0x1234));
        assert_eq!(parsed.lumps(), bsp.lumps());
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn lumps_are_aligned() {
        let mut bsp = Bsp::new(&IBSP46);
        if let Some(lump) = bsp.lumps.iter_mut().find(|l| l.name == LumpName::Entities) {
            lump.data = LumpData::Opaque(vec![b'x'; 5]);
        }
        let bytes = bsp.to_bytes().unwrap();
        let mut r = &bytes[8..];
        for _ in 0..IBSP46.lumps.len() {
            let offset = r.read_i32::<LittleEndian>().unwrap();
            let _length = r.read_i32::<LittleEndian>().unwrap();
            assert_eq!(offset % 4, 0);
        }
    }

    #[test]
    fn rejects_unknown_format() {
        let mut bytes = Bsp::new(&IBSP46).to_bytes().unwrap();
        bytes[4] = 38;
        assert!(Bsp::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_out_of_bounds_lump() {
        let mut bytes = Bsp::new(&IBSP46).to_bytes().unwrap();
        // Entities lump length.
        bytes[12] = 0xff;
        assert!(Bsp::parse(&bytes).is_err());
    }

    #[test]
    fn replace_checks_layouts() {
        let mut bsp = Bsp::new(&RBSP1);
        let wrong = vec![Record::zeroed(&Q3_SURFACE)];
        assert!(bsp.replace_lumps(vec![(LumpName::Surfaces, wrong)]).is_err());
        assert!(bsp.records(LumpName::Surfaces).unwrap().is_empty());
        assert!(bsp.records(LumpName::Planes).is_err());
        assert!(bsp.records(LumpName::EntLights).is_err());
    }

    #[test]
    fn retarget_fakk_to_alice() {
        let mut bsp = Bsp::new(&FAKK12);
        bsp.replace_lumps(vec![(
            LumpName::EntLights,
            vec![Record::zeroed(&FAKK_ENTLIGHT)],
        )])
        .unwrap();

        // Unconverted entity lights block the switch.
        assert!(bsp.retarget(&ALICE42, vec![]).is_err());
        assert_eq!(bsp.header().version, 12);

        bsp.retarget(
            &ALICE42,
            vec![(LumpName::EntLights, vec![Record::zeroed(&ALICE_ENTLIGHT)])],
        )
        .unwrap();
        assert_eq!(bsp.header().version, 42);
        assert_eq!(bsp.header().magic, *b"FAKK");
        assert_eq!(bsp.format(), &ALICE42);
        assert!(bsp.retarget(&IBSP46, vec![]).is_err());
    }
}
