pub mod booking;
pub mod verification;
