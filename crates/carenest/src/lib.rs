//! CareNest marketplace core: accounts, caregiver document verification and
//! booking requests between families and caregivers.

pub mod config;
pub mod error;
pub mod identity;
pub mod memory;
pub mod notifications;
pub mod telemetry;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
