pub mod push;
pub mod subscription;
pub mod summary;
