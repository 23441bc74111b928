//! Product lines and installation-work classification.
//!
//! Classification is derived once at intake from the product references on
//! the order lines and never recomputed afterwards.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Product references for battery units.
pub const BATTERY_PRODUCT_REFS: [i64; 2] = [4, 5];
/// Product reference for a solar panel unit.
pub const PANEL_PRODUCT_REF: i64 = 16;
/// Product reference for a battery-only installation service.
pub const INSTALL_BATTERY_REF: i64 = 26;
/// Product reference for a battery + PV installation service.
pub const INSTALL_PV_REF: i64 = 27;

/// One validated order line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    /// Product reference in the record store.
    pub product_ref: i64,
    pub quantity: i64,
    pub unit_price: f64,
}

/// What physical installation work an order requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    #[default]
    None,
    Battery,
    Pv,
}

/// Derived work classification, immutable after intake.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Work {
    #[serde(rename = "type")]
    pub kind: WorkKind,
    pub battery_count: i64,
    pub panel_count: i64,
}

/// Validate every line before any external write.
///
/// Each line needs a positive product reference, a positive quantity, and a
/// non-negative unit price. The first failing line aborts the whole intake.
pub fn validate_lines(lines: &[ProductLine]) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::Missing("order_products"));
    }
    for (index, line) in lines.iter().enumerate() {
        if line.product_ref <= 0 {
            return Err(ValidationError::InvalidLine {
                index,
                reason: "product reference must be positive",
            });
        }
        if line.quantity <= 0 {
            return Err(ValidationError::InvalidLine {
                index,
                reason: "quantity must be positive",
            });
        }
        if !line.unit_price.is_finite() || line.unit_price < 0.0 {
            return Err(ValidationError::InvalidLine {
                index,
                reason: "unit price must be non-negative",
            });
        }
    }
    Ok(())
}

/// Derive the work classification from order lines.
///
/// An install+PV line (ref 27) wins over a battery-only install line
/// (ref 26); with neither, no installation is required. Unit counts are
/// summed regardless of classification.
pub fn classify_work(lines: &[ProductLine]) -> Work {
    let mut battery_count = 0;
    let mut panel_count = 0;
    let mut has_install_battery = false;
    let mut has_install_pv = false;

    for line in lines {
        if BATTERY_PRODUCT_REFS.contains(&line.product_ref) {
            battery_count += line.quantity;
        }
        if line.product_ref == PANEL_PRODUCT_REF {
            panel_count += line.quantity;
        }
        if line.product_ref == INSTALL_BATTERY_REF {
            has_install_battery = true;
        }
        if line.product_ref == INSTALL_PV_REF {
            has_install_pv = true;
        }
    }

    let kind = if has_install_pv {
        WorkKind::Pv
    } else if has_install_battery {
        WorkKind::Battery
    } else {
        WorkKind::None
    };

    Work {
        kind,
        battery_count,
        panel_count,
    }
}
