//! Rebuilding curves from records, and serde adapters for boxed curves.

use surfkern_geom::{Curve2d, Curve2dRecord, Curve3d, Curve3dRecord, GeomError, Result};

use crate::{BSplineCurve, BSplineCurve2d};

/// Rebuild a boxed 2D curve from its record.
pub fn curve2d_from_record(record: &Curve2dRecord) -> Result<Box<dyn Curve2d>> {
    if let Some(curve) = record.to_analytic() {
        return Ok(curve);
    }
    match record {
        Curve2dRecord::BSpline {
            control_points,
            knots,
            degree,
        } => Ok(Box::new(BSplineCurve2d::new(control_points.clone(), knots.clone(), *degree)?)),
        _ => Err(GeomError::NotPersistable(format!("{record:?}"))),
    }
}

/// Rebuild a boxed 3D curve from its record.
pub fn curve3d_from_record(record: &Curve3dRecord) -> Result<Box<dyn Curve3d>> {
    if let Some(curve) = record.to_analytic() {
        return Ok(curve);
    }
    match record {
        Curve3dRecord::BSpline {
            control_points,
            knots,
            degree,
        } => Ok(Box::new(BSplineCurve::new(control_points.clone(), knots.clone(), *degree)?)),
        _ => Err(GeomError::NotPersistable(format!("{record:?}"))),
    }
}

/// Record of a boxed 2D curve, or an error naming the type that cannot persist.
pub fn curve2d_to_record(curve: &dyn Curve2d) -> Result<Curve2dRecord> {
    curve
        .to_record()
        .ok_or_else(|| GeomError::NotPersistable(format!("{:?}", curve.curve_type())))
}

/// Record of a boxed 3D curve, or an error naming the type that cannot persist.
pub fn curve3d_to_record(curve: &dyn Curve3d) -> Result<Curve3dRecord> {
    curve
        .to_record()
        .ok_or_else(|| GeomError::NotPersistable(format!("{:?}", curve.curve_type())))
}

/// `#[serde(with = "boxed_curve2d")]` for `Box<dyn Curve2d>` fields.
pub mod boxed_curve2d {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
    use surfkern_geom::{Curve2d, Curve2dRecord};

    /// Serialize through [`Curve2dRecord`].
    pub fn serialize<S: Serializer>(curve: &Box<dyn Curve2d>, s: S) -> Result<S::Ok, S::Error> {
        super::curve2d_to_record(curve.as_ref())
            .map_err(S::Error::custom)?
            .serialize(s)
    }

    /// Deserialize through [`Curve2dRecord`].
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Box<dyn Curve2d>, D::Error> {
        let record = Curve2dRecord::deserialize(d)?;
        super::curve2d_from_record(&record).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "boxed_curve3d")]` for `Box<dyn Curve3d>` fields.
pub mod boxed_curve3d {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
    use surfkern_geom::{Curve3d, Curve3dRecord};

    /// Serialize through [`Curve3dRecord`].
    pub fn serialize<S: Serializer>(curve: &Box<dyn Curve3d>, s: S) -> Result<S::Ok, S::Error> {
        super::curve3d_to_record(curve.as_ref())
            .map_err(S::Error::custom)?
            .serialize(s)
    }

    /// Deserialize through [`Curve3dRecord`].
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Box<dyn Curve3d>, D::Error> {
        let record = Curve3dRecord::deserialize(d)?;
        super::curve3d_from_record(&record).map_err(D::Error::custom)
    }
}
