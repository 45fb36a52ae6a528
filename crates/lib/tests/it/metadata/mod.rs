//! Metadata persistence across coordinator restarts

mod persistence_tests;
