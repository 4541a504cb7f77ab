//! Integration tests for poly-collector.
//!
//! These tests verify the interaction between components:
//! - Feed connection and subscription handling
//! - Session lifecycle against a live (mock) feed
//! - Manager discovery and registry behavior

pub mod common;
