//! Integration tests: full session lifecycle against an in-process fake
//! simulation server and an in-memory thermostat link.

mod fake_boptest;
mod lifecycle;
