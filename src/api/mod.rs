pub mod attendance;
pub mod geofence;
pub mod payroll;
pub mod time_entry;
pub mod worker;
