//! Built-in fallback calculators.
//!
//! A small closed set the dispatcher falls back to when no algorithm was
//! registered for an id, so the engine is usable before any domain module
//! registers itself. Domain modules that register the same id take
//! precedence.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::domain::{
    BreakdownLine, CalculationResult, CalculatorDescriptor, InputMap, InputSpec,
};

use super::registry::{CalculatorAlgorithm, ComputeError};

const STEEL_DENSITY_KG_M3: f64 = 7850.0;
const HVAC_BASE_W_PER_M2: f64 = 100.0;
const HVAC_W_PER_OCCUPANT: f64 = 120.0;
const HVAC_REFERENCE_CEILING_M: f64 = 2.7;
const W_TO_BTU_H: f64 = 3.412;

/// The closed fallback set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    SteelPlateWeight,
    HvacCoolingLoad,
    PriceMargin,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [
        Builtin::SteelPlateWeight,
        Builtin::HvacCoolingLoad,
        Builtin::PriceMargin,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Builtin::SteelPlateWeight => "steel-plate-weight",
            Builtin::HvacCoolingLoad => "hvac-cooling-load",
            Builtin::PriceMargin => "price-margin",
        }
    }

    /// Resolve a calculator id to a builtin, if one exists.
    pub fn lookup(id: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|builtin| builtin.id() == id)
    }

    /// The declared input schema for this builtin.
    pub fn descriptor(self) -> CalculatorDescriptor {
        match self {
            Builtin::SteelPlateWeight => CalculatorDescriptor::new(self.id())
                .with_input(InputSpec::number("length_mm").required().range(1.0, 20_000.0))
                .with_input(InputSpec::number("width_mm").required().range(1.0, 4_000.0))
                .with_input(InputSpec::number("thickness_mm").required().range(0.1, 50.0))
                .with_input(InputSpec::number("quantity").min(1.0))
                .with_input(InputSpec::number("density_kg_m3").range(1_000.0, 20_000.0)),
            Builtin::HvacCoolingLoad => CalculatorDescriptor::new(self.id())
                .with_input(InputSpec::number("floor_area_m2").required().range(1.0, 10_000.0))
                .with_input(InputSpec::number("ceiling_height_m").range(2.0, 10.0))
                .with_input(InputSpec::number("occupants").min(0.0))
                .with_input(InputSpec::select("insulation", ["poor", "average", "good"])),
            Builtin::PriceMargin => CalculatorDescriptor::new(self.id())
                .with_input(InputSpec::number("unit_cost").required().min(0.0))
                .with_input(InputSpec::number("unit_price").required().min(0.0))
                .with_input(InputSpec::number("quantity").min(1.0)),
        }
    }
}

/// Descriptors for the whole fallback set, registered at engine startup.
pub static BUILTIN_DESCRIPTORS: Lazy<Vec<CalculatorDescriptor>> =
    Lazy::new(|| Builtin::ALL.into_iter().map(Builtin::descriptor).collect());

impl CalculatorAlgorithm for Builtin {
    fn compute(&self, inputs: &InputMap) -> Result<CalculationResult, ComputeError> {
        match self {
            Builtin::SteelPlateWeight => steel_plate_weight(inputs),
            Builtin::HvacCoolingLoad => hvac_cooling_load(inputs),
            Builtin::PriceMargin => price_margin(inputs),
        }
    }
}

fn require_number(inputs: &InputMap, id: &str) -> Result<f64, ComputeError> {
    inputs
        .get(id)
        .and_then(Value::as_f64)
        .ok_or_else(|| ComputeError::new(format!("missing numeric input `{id}`")))
}

fn number_or(inputs: &InputMap, id: &str, default: f64) -> f64 {
    inputs.get(id).and_then(Value::as_f64).unwrap_or(default)
}

fn steel_plate_weight(inputs: &InputMap) -> Result<CalculationResult, ComputeError> {
    let length_mm = require_number(inputs, "length_mm")?;
    let width_mm = require_number(inputs, "width_mm")?;
    let thickness_mm = require_number(inputs, "thickness_mm")?;
    let quantity = number_or(inputs, "quantity", 1.0);
    let density = number_or(inputs, "density_kg_m3", STEEL_DENSITY_KG_M3);

    let volume_m3 = (length_mm / 1000.0) * (width_mm / 1000.0) * (thickness_mm / 1000.0);
    let unit_weight_kg = volume_m3 * density;
    let total_weight_kg = unit_weight_kg * quantity;

    let mut result = CalculationResult::new(total_weight_kg, "kg", "Total weight")
        .with_breakdown(BreakdownLine::new("Plate volume", volume_m3, "m³"))
        .with_breakdown(
            BreakdownLine::new("Weight per plate", unit_weight_kg, "kg")
                .with_percentage(100.0 / quantity),
        )
        .with_breakdown(
            BreakdownLine::new("Total weight", total_weight_kg, "kg").with_percentage(100.0),
        );

    if total_weight_kg > 1_000.0 {
        result = result
            .with_recommendation("Total exceeds 1 t; plan lifting equipment for handling.");
    }
    if thickness_mm > 25.0 {
        result = result.with_recommendation(
            "Plates over 25 mm usually need pre-heating before welding.",
        );
    }
    Ok(result)
}

fn hvac_cooling_load(inputs: &InputMap) -> Result<CalculationResult, ComputeError> {
    let floor_area_m2 = require_number(inputs, "floor_area_m2")?;
    let ceiling_height_m = number_or(inputs, "ceiling_height_m", HVAC_REFERENCE_CEILING_M);
    let occupants = number_or(inputs, "occupants", 0.0);
    let insulation_factor = match inputs.get("insulation").and_then(Value::as_str) {
        Some("poor") => 1.3,
        Some("good") => 0.8,
        _ => 1.0,
    };

    let envelope_w = floor_area_m2
        * HVAC_BASE_W_PER_M2
        * (ceiling_height_m / HVAC_REFERENCE_CEILING_M)
        * insulation_factor;
    let occupant_w = occupants * HVAC_W_PER_OCCUPANT;
    let total_w = envelope_w + occupant_w;
    let total_btu_h = total_w * W_TO_BTU_H;

    let mut result = CalculationResult::new(total_w, "W", "Cooling load")
        .with_breakdown(
            BreakdownLine::new("Envelope load", envelope_w, "W")
                .with_percentage(100.0 * envelope_w / total_w),
        )
        .with_breakdown(
            BreakdownLine::new("Occupant load", occupant_w, "W")
                .with_percentage(100.0 * occupant_w / total_w),
        )
        .with_breakdown(BreakdownLine::new("Equivalent", total_btu_h, "BTU/h"));

    if total_w > 10_000.0 {
        result = result.with_recommendation(
            "Load exceeds 10 kW; consider splitting across multiple indoor units.",
        );
    }
    Ok(result)
}

fn price_margin(inputs: &InputMap) -> Result<CalculationResult, ComputeError> {
    let unit_cost = require_number(inputs, "unit_cost")?;
    let unit_price = require_number(inputs, "unit_price")?;
    let quantity = number_or(inputs, "quantity", 1.0);

    if unit_price == 0.0 {
        return Err(ComputeError::new("`unit_price` must be non-zero"));
    }

    let unit_margin = unit_price - unit_cost;
    let margin_pct = 100.0 * unit_margin / unit_price;
    let markup_pct = if unit_cost == 0.0 {
        100.0
    } else {
        100.0 * unit_margin / unit_cost
    };
    let total_margin = unit_margin * quantity;

    let mut result = CalculationResult::new(margin_pct, "%", "Gross margin")
        .with_breakdown(BreakdownLine::new("Margin per unit", unit_margin, ""))
        .with_breakdown(BreakdownLine::new("Markup", markup_pct, "%"))
        .with_breakdown(BreakdownLine::new("Total margin", total_margin, ""));

    if unit_margin < 0.0 {
        result = result.with_recommendation("Selling below cost; review the pricing.");
    } else if margin_pct < 15.0 {
        result = result
            .with_recommendation("Margin is under 15%; thin for typical wholesale pricing.");
    }
    Ok(result)
}
