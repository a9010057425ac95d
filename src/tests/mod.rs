//! Integration-style tests exercising full `Logger` scenarios end to end,
//! as opposed to the per-module unit tests colocated with each file. Mirrors
//! the teacher's `src/tests/` aggregator convention.

mod scenarios;
