pub mod asset;
pub mod error;

pub const DEFAULT_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8190;

pub struct AddrInfo {
    pub addr: String,
    pub port: u16,
}

impl AddrInfo {
    pub fn as_url(&self) -> String {
        format!("http://{}:{}", self.addr, self.port)
    }

    pub fn as_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("PIXVAULT_ADDR").ok(),
            std::env::var("PIXVAULT_PORT").ok(),
        )
    }

    /// Unset or unparseable values fall back to the defaults.
    fn from_values(addr: Option<String>, port: Option<String>) -> Self {
        Self {
            addr: addr.unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            port: port
                .and_then(|val| val.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }
}
