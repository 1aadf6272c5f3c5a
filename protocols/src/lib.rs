pub mod arp;
pub mod frame;
pub mod http;
pub mod parsers;
