pub mod logging;
pub mod masking;
