//! Integration tests for the context store and its endpoint codecs

mod config_integration;
mod docker_endpoint;
mod kubernetes_endpoint;
mod test_utils;
