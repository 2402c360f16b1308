pub mod execute;
pub mod job_info;
