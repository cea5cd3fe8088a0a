// Each integration test binary uses a different subset of these helpers
#![allow(dead_code)]

pub mod fixtures;
pub mod mock_server;
