pub mod evaluate;
pub mod message;
pub mod request;
pub mod response;
