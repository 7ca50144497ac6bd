pub mod node_state;
pub mod packer;
pub mod recent_shapes;
pub mod reservation;
pub mod runtime_estimator;
pub mod shape;
pub mod termination;
