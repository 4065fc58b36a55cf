pub mod approver;
pub mod config;
pub mod ingress;
pub mod polling;
pub mod registry;
pub mod wizard;
