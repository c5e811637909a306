// RouterOS REST API surface
//
// Transport mechanics live in `client`; each sibling module adds the
// inherent methods for one resource menu.

pub mod client;
pub mod models;

mod ip;
mod ppp;
mod system;
