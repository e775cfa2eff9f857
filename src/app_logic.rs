/*
 * This module provides the application logic layer, centered around
 * `SessionCoordinator`, which owns all mutable session state and mediates
 * between the front-end and the core scan/collect/export machinery.
 * Unit tests for the coordinator are in `coordinator_tests.rs`.
 */
pub mod coordinator;


pub use coordinator::{ScanTimeoutPrompt, SessionCoordinator};
