pub mod sim;
pub mod udp;
