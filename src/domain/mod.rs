// Domain layer: models and ports shared by the pipeline stages and the adapters.

pub mod model;
pub mod ports;
