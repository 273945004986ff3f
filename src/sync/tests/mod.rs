//! Unit tests for the sync context.

mod support;
