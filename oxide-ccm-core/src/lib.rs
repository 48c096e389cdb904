pub mod config;
pub mod error;
pub mod instances;
pub mod loadbalancer;
pub mod oxide;
pub mod provider_id;
