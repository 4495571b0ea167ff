pub mod portscan_nmap;
pub mod types;
pub mod windows_enum;

pub use portscan_nmap::NmapScanner;
pub use windows_enum::WindowsProbe;
