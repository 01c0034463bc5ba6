pub mod pricing;
pub mod taxonomy;
