//! Cross-reference maintenance for lumps that index other lumps by position.

use anyhow::Result;
use idtech3_bsp::bsp::Bsp;
use idtech3_bsp::format::LumpName;
use idtech3_bsp::record::{Field, Record};

/// How negative values in an index field are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sentinel {
    /// Negative values mean "no reference" and are left alone.
    Negative,
    /// Every value is a live reference.
    None,
}

impl Sentinel {
    fn skips(self, value: i32) -> bool {
        match self {
            Sentinel::Negative => value < 0,
            Sentinel::None => false,
        }
    }
}

/// Applies `f` to every element of `field` in every record, skipping sentinel values. Records
/// whose layout lacks `field` are left untouched. Returns the number of elements changed.
pub fn remap_indices<F>(
    records: &mut [Record],
    field: Field,
    sentinel: Sentinel,
    mut f: F,
) -> Result<usize>
where
    F: FnMut(i32) -> i32,
{
    let mut changed = 0;
    for record in records {
        let count = match record.count(field) {
            Some(count) => count,
            None => continue,
        };
        for i in 0..count {
            let old = record.get_i32(field, i)?;
            if sentinel.skips(old) {
                continue;
            }
            let new = f(old);
            if new != old {
                record.set_i32(field, i, new)?;
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Adds `delta` to every non-negative element of `field` that is at least `threshold`.
pub fn shift_indices(
    records: &mut [Record],
    field: Field,
    threshold: i32,
    delta: i32,
) -> Result<usize> {
    remap_indices(records, field, Sentinel::Negative, |index| {
        if index >= threshold {
            index.wrapping_add(delta)
        } else {
            index
        }
    })
}

/// Collapses interleaved lightmap numbering: pair `(2k, 2k + 1)` becomes `k`.
pub fn halve_indices(records: &mut [Record], field: Field) -> Result<usize> {
    remap_indices(records, field, Sentinel::Negative, |index| index >> 1)
}

/// Computes the lumps that change when `k` surfaces are inserted at the head of the surfaces
/// lump. Surface references have no sentinel, so every one of them moves. Brush sides only take
/// part when their layout carries a surface index.
pub fn shift_surface_references(bsp: &Bsp, k: i32) -> Result<Vec<(LumpName, Vec<Record>)>> {
    let mut replacements = Vec::new();
    for (lump, field) in [
        (LumpName::LeafSurfaces, Field::Surface),
        (LumpName::Models, Field::FirstSurface),
        (LumpName::BrushSides, Field::DrawSurface),
    ] {
        let has_field = bsp
            .format()
            .layout(lump)
            .map_or(false, |layout| layout.has_field(field));
        if !has_field {
            continue;
        }
        let mut records = bsp.records(lump)?.to_vec();
        remap_indices(&mut records, field, Sentinel::None, |index| {
            index.wrapping_add(k)
        })?;
        replacements.push((lump, records));
    }
    Ok(replacements)
}
