//! Infrastructure layer - storage and host probes

pub mod memory;
pub mod storage;
