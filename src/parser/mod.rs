pub mod nmap;
pub mod windows;

pub use nmap::NmapExtractor;
