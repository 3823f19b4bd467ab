pub mod base64;
pub mod crypto;
pub mod random;
pub mod size;
pub mod string;
pub mod time;
