pub mod locks;
pub mod pricing;
pub mod requirement_status;
pub mod requirements;
