//! The [`ModelFactory`] wiring [`BucketSoil`] and [`ThermalCrop`] into a run.

use furrow_core::{CropGrowth, ModelFactory, SoilModel};
use furrow_types::{CropParameters, SiteParameters, SoilLayer};
use tracing::debug;

use crate::crop::ThermalCrop;
use crate::soil::BucketSoil;

/// Builds bucket soils and thermal-time crops.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldModels;

impl ModelFactory for FieldModels {
    fn soil(&self, layers: &[SoilLayer], site: &SiteParameters) -> Box<dyn SoilModel> {
        Box::new(BucketSoil::new(layers, site))
    }

    fn crop(&self, params: &CropParameters, _site: &SiteParameters) -> Box<dyn CropGrowth> {
        debug!(
            crop = %params.id,
            maturity = params.growth.maturity_temperature_sum(),
            "Crop model created"
        );
        Box::new(ThermalCrop::new(params.growth.clone()))
    }
}
