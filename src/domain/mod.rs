// Domain layer: service metadata and the plugin port. No backend code lives here.

pub mod model;
pub mod ports;
