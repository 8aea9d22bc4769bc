//! Query modules for CRMDesk data stored in Redis.

pub mod drafts;
pub mod records;
