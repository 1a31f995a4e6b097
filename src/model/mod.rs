pub mod location;
pub mod payroll;
pub mod time_entry;
pub mod worker;
