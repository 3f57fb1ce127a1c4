pub mod audit;
pub mod harvest;
pub mod init;
pub mod status;
