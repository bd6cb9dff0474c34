//! Parcel weight and volume maths used by transport rules.
use crate::db_types::{CartonType, OrderLine, Product};

const CM3_PER_M3: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelMetrics {
    pub volume_cm3: f64,
    pub real_weight_kg: f64,
    pub volumetric_weight_kg: f64,
    pub billable_weight_kg: f64,
}

/// Sums weight and volume over the order lines. Each line is paired with the product it was matched to.
///
/// `volumetric = Σ(volume_m3 × qty) × 1 000 000 / divisor`, and the billable weight is the larger of the real and the
/// volumetric weight.
pub fn compute_parcel_metrics<'a, I>(lines: I, divisor: f64) -> ParcelMetrics
where I: IntoIterator<Item = (&'a OrderLine, &'a Product)> {
    let (volume_m3, real_weight_kg) = lines.into_iter().fold((0.0, 0.0), |(vol, weight), (line, product)| {
        let qty = line.quantity as f64;
        (vol + product.volume_m3 * qty, weight + product.unit_weight_kg * qty)
    });
    let volume_cm3 = volume_m3 * CM3_PER_M3;
    let volumetric_weight_kg = volume_cm3 / divisor;
    let billable_weight_kg = real_weight_kg.max(volumetric_weight_kg);
    ParcelMetrics { volume_cm3, real_weight_kg, volumetric_weight_kg, billable_weight_kg }
}

/// The smallest active carton that holds `volume_cm3`, or `None` if nothing is big enough.
pub fn select_carton(cartons: &[CartonType], volume_cm3: f64) -> Option<&CartonType> {
    let mut candidates = cartons.iter().filter(|c| c.active).collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.volume_cm3.total_cmp(&b.volume_cm3));
    candidates.into_iter().find(|c| c.volume_cm3 >= volume_cm3)
}
