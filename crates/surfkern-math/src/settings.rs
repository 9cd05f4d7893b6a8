//! Tolerance policy and solver limits.
//!
//! The kernel reads its tolerances from thread-local [`KernelSettings`]. A
//! computation that needs different tolerances installs them with
//! [`KernelSettings::scoped`] or [`Tolerance::scoped`]; the returned guard
//! restores the previous settings when dropped.

use std::cell::Cell;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Point2, Point3};

/// Errors raised while loading kernel settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The TOML document could not be parsed.
    #[error("invalid kernel settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid kernel settings: {0}")]
    OutOfRange(String),
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default kernel tolerances (1e-6 linear, 1e-6 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-6,
    };

    /// Create a tolerance pair.
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }

    /// The tolerance currently in effect on this thread.
    pub fn current() -> Self {
        KernelSettings::current().tolerance
    }

    /// Install `self` as the current tolerance until the guard is dropped.
    pub fn scoped(self) -> SettingsGuard {
        KernelSettings {
            tolerance: self,
            ..KernelSettings::current()
        }
        .scoped()
    }

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if two parameter-space points are coincident within tolerance.
    pub fn points2_equal(&self, a: &Point2, b: &Point2) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two angles are effectively equal (in radians).
    pub fn angles_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tolerances plus the iteration and sampling limits of the numeric solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// Linear and angular tolerance.
    pub tolerance: Tolerance,
    /// Iteration cap for every Newton solve.
    pub max_newton_iterations: usize,
    /// Initial number of samples when a curve is projected numerically.
    pub projection_samples: usize,
    /// Upper bound on samples after adaptive refinement.
    pub max_refinement_samples: usize,
    /// Cells per side of the marching grid used by numeric plane intersection.
    pub intersection_grid: usize,
}

impl KernelSettings {
    /// Defaults used when nothing was installed.
    pub const DEFAULT: Self = Self {
        tolerance: Tolerance::DEFAULT,
        max_newton_iterations: 50,
        projection_samples: 17,
        max_refinement_samples: 513,
        intersection_grid: 48,
    };

    /// The settings currently in effect on this thread.
    pub fn current() -> Self {
        SETTINGS.with(|s| s.get())
    }

    /// Install `self` until the returned guard is dropped.
    pub fn scoped(self) -> SettingsGuard {
        let previous = SETTINGS.with(|s| s.replace(self));
        SettingsGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Parse settings from a TOML document. Missing keys keep their defaults.
    ///
    /// ```toml
    /// max_newton_iterations = 80
    ///
    /// [tolerance]
    /// linear = 1e-7
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !(self.tolerance.linear > 0.0) || !(self.tolerance.angular > 0.0) {
            return Err(SettingsError::OutOfRange(
                "tolerances must be positive".into(),
            ));
        }
        if self.max_newton_iterations == 0 {
            return Err(SettingsError::OutOfRange(
                "max_newton_iterations must be at least 1".into(),
            ));
        }
        if self.projection_samples < 3 || self.max_refinement_samples < self.projection_samples {
            return Err(SettingsError::OutOfRange(format!(
                "projection_samples ({}) must be >= 3 and <= max_refinement_samples ({})",
                self.projection_samples, self.max_refinement_samples
            )));
        }
        if self.intersection_grid < 2 {
            return Err(SettingsError::OutOfRange(
                "intersection_grid must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

thread_local! {
    static SETTINGS: Cell<KernelSettings> = const { Cell::new(KernelSettings::DEFAULT) };
}

/// Restores the previous [`KernelSettings`] when dropped.
///
/// Guards must be dropped in reverse order of creation; they are tied to the
/// thread that created them.
#[must_use = "the settings are restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SettingsGuard {
    previous: KernelSettings,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SettingsGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        SETTINGS.with(|s| s.set(previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_points_equal() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-7, 2.0, 3.0);
        assert!(tol.points_equal(&a, &b));
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(!tol.points_equal(&a, &c));
    }

    #[test]
    fn test_scoped_override_restores() {
        assert_eq!(Tolerance::current(), Tolerance::DEFAULT);
        {
            let _outer = Tolerance::new(1e-3, 1e-4).scoped();
            assert_eq!(Tolerance::current().linear, 1e-3);
            {
                let _inner = KernelSettings {
                    max_newton_iterations: 5,
                    ..KernelSettings::current()
                }
                .scoped();
                assert_eq!(KernelSettings::current().max_newton_iterations, 5);
                // Inner scope keeps the outer tolerance
                assert_eq!(Tolerance::current().linear, 1e-3);
            }
            assert_eq!(KernelSettings::current().max_newton_iterations, 50);
        }
        assert_eq!(KernelSettings::current(), KernelSettings::DEFAULT);
    }

    #[test]
    fn test_settings_are_thread_local() {
        let _guard = Tolerance::new(0.5, 0.5).scoped();
        let other = std::thread::spawn(Tolerance::current).join().unwrap();
        assert_eq!(other, Tolerance::DEFAULT);
        assert_eq!(Tolerance::current().linear, 0.5);
    }

    #[test]
    fn test_from_toml_partial() {
        let s = KernelSettings::from_toml_str(
            "max_newton_iterations = 80\n\n[tolerance]\nlinear = 1e-7\n",
        )
        .unwrap();
        assert_eq!(s.max_newton_iterations, 80);
        assert_eq!(s.tolerance.linear, 1e-7);
        assert_eq!(s.tolerance.angular, Tolerance::DEFAULT.angular);
        assert_eq!(s.intersection_grid, KernelSettings::DEFAULT.intersection_grid);
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            KernelSettings::from_toml_str("[tolerance]\nlinear = -1.0\n"),
            Err(SettingsError::OutOfRange(_))
        ));
        assert!(matches!(
            KernelSettings::from_toml_str("max_newton_iterations = \"many\""),
            Err(SettingsError::Parse(_))
        ));
    }
}
