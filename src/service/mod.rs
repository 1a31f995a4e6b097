pub mod attendance;
pub mod clock;
pub mod ledger;
pub mod location;
pub mod monitor;
pub mod payroll;
