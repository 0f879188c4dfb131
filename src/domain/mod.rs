// Domain layer: models and ports shared by the engine and the adapters.

pub mod model;
pub mod ports;
