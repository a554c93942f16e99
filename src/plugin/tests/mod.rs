//! Plugin System Tests
