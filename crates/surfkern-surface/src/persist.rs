//! JSON persistence of surfaces.
//!
//! A surface is written as its defining state only. Derived caches (the
//! cylinder's implicit form, the helical inverse frame) are rebuilt lazily
//! after reading, so a round trip reproduces every evaluation bit for bit.

use serde::{Deserialize, Serialize};
use surfkern_geom::Plane;

use crate::error::{Result, SurfaceError};
use crate::{CylindricalSurfaceNp, HelicalSurface, Surface, SurfaceOfLinearExtrusion};

/// Serializable description of a surface, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceRecord {
    /// An infinite plane.
    Plane(Plane),
    /// A restricted-annulus cylinder.
    Cylinder(CylindricalSurfaceNp),
    /// A profile swept along a helix.
    Helical(HelicalSurface),
    /// A curve extruded along a direction.
    Extrusion(SurfaceOfLinearExtrusion),
}

impl SurfaceRecord {
    /// Rebuild the surface, re-checking its construction invariants.
    pub fn into_surface(self) -> Result<Box<dyn Surface>> {
        Ok(match self {
            SurfaceRecord::Plane(p) => Box::new(p),
            SurfaceRecord::Cylinder(c) => {
                c.validate()?;
                Box::new(c)
            }
            SurfaceRecord::Helical(h) => {
                h.validate()?;
                Box::new(h)
            }
            SurfaceRecord::Extrusion(e) => {
                e.validate()?;
                Box::new(e)
            }
        })
    }
}

/// Serialize a surface to JSON.
///
/// Fails with [`SurfaceError::NotPersistable`] for surface types without a
/// record.
pub fn to_json(surface: &dyn Surface) -> Result<String> {
    let record = surface
        .to_record()
        .ok_or(SurfaceError::NotPersistable(surface.kind()))?;
    Ok(serde_json::to_string(&record)?)
}

/// Read a surface written by [`to_json`].
pub fn from_json(json: &str) -> Result<Box<dyn Surface>> {
    let record: SurfaceRecord = serde_json::from_str(json)?;
    log::debug!("read {:?} surface record", record_kind(&record));
    record.into_surface()
}

fn record_kind(record: &SurfaceRecord) -> &'static str {
    match record {
        SurfaceRecord::Plane(_) => "plane",
        SurfaceRecord::Cylinder(_) => "cylinder",
        SurfaceRecord::Helical(_) => "helical",
        SurfaceRecord::Extrusion(_) => "extrusion",
    }
}
