pub mod annotate;
pub mod dto;
pub mod ports;
pub mod services;
