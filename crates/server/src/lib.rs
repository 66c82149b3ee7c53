//! Headless authoritative server: bootstrap, scenario loading, the fixed-timestep
//! driver and periodic metrics around a `frost_sim::World`.

pub mod app;
