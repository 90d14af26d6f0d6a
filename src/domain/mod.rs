pub mod deadline;
pub mod errors;
pub mod money;
pub mod pipeline;
pub mod ports;
pub mod records;
