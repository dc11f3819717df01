pub mod interface;
pub mod link;
pub mod packet;
pub mod route;
pub mod topology;
