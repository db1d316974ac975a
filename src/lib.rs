pub mod buffer;
pub mod chart;
pub mod codec;
pub mod config;
pub mod cycle;
pub mod sample;
pub mod sampler;
pub mod source;
