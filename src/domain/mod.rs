// Domain layer: the values that cross the boundary with the host framework, and the
// ports (traits) the host implements.

pub mod model;
pub mod ports;
