pub mod detailed;
pub mod model;
pub mod render;
