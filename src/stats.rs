use crate::registry::CellRegistry;

/// Population mean and standard deviation of one per-cell metric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeanDev {
    pub mean: f64,
    pub deviation: f64,
}

impl MeanDev {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
        Self {
            mean,
            deviation: variance.sqrt(),
        }
    }
}

/// Aggregate shape metrics across all cells, measured once per outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellStats {
    pub volume: MeanDev,
    pub perimeter: MeanDev,
    /// Perimeter length over volume.
    pub anisotropy: MeanDev,
}

impl CellStats {
    pub fn measure(registry: &CellRegistry) -> Self {
        let mut volumes = Vec::with_capacity(registry.num_cells() as usize);
        let mut perimeters = Vec::with_capacity(registry.num_cells() as usize);
        let mut anisotropies = Vec::with_capacity(registry.num_cells() as usize);

        for cell in registry.cell_ids() {
            let volume = registry.volume_of(cell).len() as f64;
            let perimeter = registry.perimeter_of(cell).len() as f64;
            volumes.push(volume);
            perimeters.push(perimeter);
            anisotropies.push(if volume > 0.0 { perimeter / volume } else { 0.0 });
        }

        Self {
            volume: MeanDev::of(&volumes),
            perimeter: MeanDev::of(&perimeters),
            anisotropy: MeanDev::of(&anisotropies),
        }
    }
}
