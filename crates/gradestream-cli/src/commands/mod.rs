pub mod grade;
pub mod init;
pub mod output;
pub mod render;
