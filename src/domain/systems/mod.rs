// Simulation systems run by the session coordinator.

pub mod physics;
