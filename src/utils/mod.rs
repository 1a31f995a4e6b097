pub mod location_cache;
