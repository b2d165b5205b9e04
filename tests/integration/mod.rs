//! Integration tests for the coldset backup pipeline

mod config_layers;
mod naming;
mod partition;
mod pipeline;
mod restore;
mod roundtrip;
mod support;
