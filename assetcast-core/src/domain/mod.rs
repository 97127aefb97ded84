//! Domain types shared by every pipeline stage.

pub mod bar;
pub mod prediction;
pub mod series;

pub use bar::PriceBar;
pub use prediction::PredictionRecord;
pub use series::AssetSeries;
