pub mod db;
pub mod email;
pub mod rabbitmq;
pub mod redis;
