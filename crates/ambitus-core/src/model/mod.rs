pub mod calibration;
pub mod dimension;
pub mod direction;
pub mod pca;
pub mod track;

pub use calibration::{
    CalibrationBucket, CalibrationMode, CalibrationTable, Discriminator, Resolution,
};
pub use dimension::{Dimension, Domain};
pub use direction::{Direction, Polarity};
pub use pca::{
    ComponentTerm, Pca, PcaDomain, PcaTransformWeight, PcaWeights, DOMAIN_COMPONENTS, PRIMARY_D,
};
pub use track::{Features, Latent, Track, TrackMetadata, LATENT_DIMENSIONS};
