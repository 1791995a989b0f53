pub mod dump_config;
pub mod extract;
pub mod init;
pub mod run;
